use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::process;

use larder_core::models::IngredientRow;

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Report a missing record and exit with status 2.
pub(crate) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Positions on the command line are 1-based.
pub(crate) fn parse_position(n: usize) -> Result<usize> {
    if n == 0 {
        bail!("Positions start at 1");
    }
    Ok(n - 1)
}

/// Parse an ingredient given as `qty|unit|item`, `qty|item`, or just `item`.
pub(crate) fn parse_ingredient(s: &str) -> Result<IngredientRow> {
    let parts: Vec<&str> = s.split('|').map(str::trim).collect();
    let row = match parts.as_slice() {
        [item] => IngredientRow {
            item: (*item).to_string(),
            ..IngredientRow::default()
        },
        [qty, item] => IngredientRow {
            qty: (*qty).to_string(),
            item: (*item).to_string(),
            ..IngredientRow::default()
        },
        [qty, unit, item] => IngredientRow {
            qty: (*qty).to_string(),
            unit: (*unit).to_string(),
            item: (*item).to_string(),
        },
        _ => bail!("Invalid ingredient '{s}'. Use 'qty|unit|item', 'qty|item' or 'item'"),
    };
    if row.item.is_empty() {
        bail!("Ingredient '{s}' has no item name");
    }
    Ok(row)
}

pub(crate) fn read_json_file(path: &std::path::Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// `-` for a missing value.
pub(crate) fn or_dash<T: std::fmt::Display>(v: Option<T>) -> String {
    v.map_or_else(|| "-".to_string(), |v| v.to_string())
}
