use std::io::Write;

use anyhow::Result;

use crate::grocery::group_by_store;
use crate::models::GroceryItem;

/// Grocery list as CSV, in the same store order the grouped view uses.
pub fn write_grocery_csv<W: Write>(items: &[GroceryItem], writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "store",
        "name",
        "qty",
        "unit",
        "checked",
        "added_date",
        "product_url",
        "notes",
        "source_recipe",
    ])?;

    let mut rows = 0;
    for group in group_by_store(items) {
        for item in &group.items {
            wtr.write_record([
                group.store.as_str(),
                item.name.as_str(),
                item.qty.as_str(),
                item.unit.as_str(),
                if item.checked { "yes" } else { "no" },
                item.added_date.as_str(),
                item.product_url.as_str(),
                item.notes.as_str(),
                item.source_recipe.as_deref().unwrap_or(""),
            ])?;
            rows += 1;
        }
    }
    wtr.flush()?;
    Ok(rows)
}
