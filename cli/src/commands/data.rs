use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use super::Larder;
use super::helpers::{print_json, read_json_file};

/// Dump every stored document as one JSON object keyed by path.
pub(crate) fn cmd_export(larder: &Larder, output: Option<&std::path::Path>) -> Result<()> {
    let tree = larder.export_tree()?;
    let text = serde_json::to_string_pretty(&tree)?;
    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Exported {} document(s) to {}", tree.len(), path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

pub(crate) fn cmd_import(larder: &mut Larder, file: &std::path::Path, json: bool) -> Result<()> {
    let tree = parse_tree(read_json_file(file)?)?;
    let written = larder.import_tree(&tree)?;
    if json {
        print_json(&serde_json::json!({ "imported": written }))
    } else {
        println!("Imported {written} document(s) from {}", file.display());
        Ok(())
    }
}

fn parse_tree(value: Value) -> Result<BTreeMap<String, Value>> {
    let Value::Object(map) = value else {
        bail!("Import file must be a JSON object keyed by document path");
    };
    Ok(map.into_iter().collect())
}
