use anyhow::{Context, Result};
use chrono::Local;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::export::write_grocery_csv;
use larder_core::grocery::unit_suggestions;
use larder_core::models::{GroceryEdit, NewGroceryItem};
use larder_core::shops::{self, store_suggestions};

use super::Larder;
use super::helpers::{exit_not_found, print_json, truncate};

/// Add an item. Fields left out fall back to what was last used for the
/// same name.
pub(crate) fn cmd_grocery_add(larder: &mut Larder, form: NewGroceryItem, json: bool) -> Result<()> {
    let groceries = larder.groceries();
    let prefill = groceries.select_suggestion(&form.name);
    let pick = |given: String, remembered: String| {
        if given.trim().is_empty() {
            remembered
        } else {
            given
        }
    };
    let form = NewGroceryItem {
        unit: pick(form.unit, prefill.unit),
        store: pick(form.store, prefill.store),
        product_url: pick(form.product_url, prefill.product_url),
        notes: pick(form.notes, prefill.notes),
        ..form
    };

    let item = groceries.add_item(&form, Local::now())?;
    if json {
        print_json(&item)
    } else {
        let qty = [item.qty.as_str(), item.unit.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        if qty.is_empty() {
            println!("Added {} to {} (id: {})", item.name, item.store, item.id);
        } else {
            println!("Added {qty} {} to {} (id: {})", item.name, item.store, item.id);
        }
        Ok(())
    }
}

pub(crate) fn cmd_grocery_list(larder: &mut Larder, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = " ")]
        checked: &'static str,
        #[tabled(rename = "Item")]
        name: String,
        #[tabled(rename = "Qty")]
        qty: String,
        #[tabled(rename = "Added")]
        added: String,
        #[tabled(rename = "Notes")]
        notes: String,
    }

    let groceries = larder.groceries();
    let groups = groceries.groups();
    if json {
        return print_json(&groups);
    }
    if groups.is_empty() {
        eprintln!("Grocery list is empty");
        return Ok(());
    }

    for group in &groups {
        match group.url {
            Some(url) => println!("{} ({} left) {url}", group.store, group.remaining),
            None => println!("{} ({} left)", group.store, group.remaining),
        }
        let rows: Vec<ItemRow> = group
            .items
            .iter()
            .map(|i| ItemRow {
                id: i.id.clone(),
                checked: if i.checked { "x" } else { "" },
                name: truncate(&i.name, 30),
                qty: format!("{} {}", i.qty, i.unit).trim().to_string(),
                added: i.added_date.clone(),
                notes: truncate(&i.notes, 30),
            })
            .collect();
        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::single(3)).with(Alignment::right()))
            .to_string();
        println!("{table}\n");
    }
    let total = groceries.items().len();
    println!("{} of {total} checked off", groceries.checked_count());
    Ok(())
}

pub(crate) fn cmd_grocery_check(larder: &mut Larder, id: &str, json: bool) -> Result<()> {
    let Some(checked) = larder.groceries().toggle_checked(id) else {
        exit_not_found(&format!("No grocery item with id {id}"), json);
    };
    if json {
        print_json(&serde_json::json!({ "id": id, "checked": checked }))
    } else {
        println!("{id}: {}", if checked { "checked" } else { "unchecked" });
        Ok(())
    }
}

pub(crate) fn cmd_grocery_remove(larder: &mut Larder, id: &str, json: bool) -> Result<()> {
    let Some(removed) = larder.groceries().remove_item(id) else {
        exit_not_found(&format!("No grocery item with id {id}"), json);
    };
    if json {
        print_json(&removed)
    } else {
        println!("Removed {}", removed.name);
        Ok(())
    }
}

pub(crate) fn cmd_grocery_edit(
    larder: &mut Larder,
    id: &str,
    edit: &GroceryEdit,
    json: bool,
) -> Result<()> {
    if edit.is_empty() {
        anyhow::bail!("Nothing to change. Pass at least one of --name, --qty, --unit, --store, --url, --notes");
    }
    let Some(updated) = larder.groceries().edit_item(id, edit)? else {
        exit_not_found(&format!("No grocery item with id {id}"), json);
    };
    if json {
        print_json(&updated)
    } else {
        println!("Updated {} ({})", updated.name, updated.store);
        Ok(())
    }
}

pub(crate) fn cmd_grocery_clear_checked(larder: &mut Larder, json: bool) -> Result<()> {
    let removed = larder.groceries().clear_checked();
    if json {
        print_json(&serde_json::json!({ "removed": removed }))
    } else {
        println!("Removed {removed} checked item(s)");
        Ok(())
    }
}

/// Item suggestions, or unit suggestions with `units`.
pub(crate) fn cmd_grocery_suggest(
    larder: &mut Larder,
    query: &str,
    units: bool,
    json: bool,
) -> Result<()> {
    if units {
        let found = unit_suggestions(query);
        if json {
            return print_json(&found);
        }
        for unit in found {
            println!("{unit}");
        }
        return Ok(());
    }

    let groceries = larder.groceries();
    let names = groceries.item_suggestions(query);
    if json {
        let prefills: Vec<_> = names
            .iter()
            .map(|n| groceries.select_suggestion(n))
            .collect();
        return print_json(&prefills);
    }
    if names.is_empty() {
        eprintln!("No suggestions");
        return Ok(());
    }
    for name in &names {
        let p = groceries.select_suggestion(name);
        if p.store.is_empty() {
            println!("{}", p.name);
        } else {
            println!("{} ({})", p.name, p.store);
        }
    }
    Ok(())
}

pub(crate) fn cmd_grocery_stores(query: &str, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct StoreRow {
        #[tabled(rename = "Store")]
        name: &'static str,
        #[tabled(rename = "Kind")]
        kind: String,
        #[tabled(rename = "Website")]
        url: &'static str,
    }

    let names = store_suggestions(query);
    let known: Vec<_> = names.iter().filter_map(|n| shops::lookup(n)).collect();
    if json {
        return print_json(&known);
    }
    let rows: Vec<StoreRow> = known
        .iter()
        .map(|m| StoreRow {
            name: m.name,
            kind: format!("{:?}", m.kind).to_lowercase(),
            url: m.url.unwrap_or(""),
        })
        .collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}

/// Write the list as CSV to `output`, or stdout.
pub(crate) fn cmd_grocery_export(
    larder: &mut Larder,
    output: Option<&std::path::Path>,
) -> Result<()> {
    let items = larder.groceries().items().to_vec();
    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let rows = write_grocery_csv(&items, file)?;
            eprintln!("Wrote {rows} item(s) to {}", path.display());
        }
        None => {
            write_grocery_csv(&items, std::io::stdout().lock())?;
        }
    }
    Ok(())
}
