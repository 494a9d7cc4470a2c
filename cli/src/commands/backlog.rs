use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::planner::{MealKind, PlanError};

use super::Larder;
use super::helpers::{exit_not_found, parse_position, print_json};

fn label(kind: MealKind) -> &'static str {
    match kind {
        MealKind::Dinner => "idea",
        MealKind::Lunch => "lunch item",
    }
}

pub(crate) fn cmd_backlog_add(
    larder: &mut Larder,
    kind: MealKind,
    text: &str,
    json: bool,
) -> Result<()> {
    let added = larder.planner_mut().add_to_backlog(kind, text)?;
    if json {
        print_json(&serde_json::json!({ "added": added, "kind": kind }))
    } else {
        println!("Added {} '{added}'", label(kind));
        Ok(())
    }
}

pub(crate) fn cmd_backlog_list(larder: &Larder, kind: MealKind, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct BacklogRow {
        #[tabled(rename = "#")]
        position: usize,
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Recipe")]
        recipe: String,
    }

    let planner = larder.planner();
    let backlog = planner.backlog(kind);
    if json {
        return print_json(&backlog);
    }
    if backlog.is_empty() {
        eprintln!("No {}s yet", label(kind));
        return Ok(());
    }

    let rows: Vec<BacklogRow> = backlog
        .iter()
        .enumerate()
        .map(|(i, meal)| BacklogRow {
            position: i + 1,
            meal: meal.clone(),
            recipe: if planner.recipe(kind, meal).is_some() {
                "yes".to_string()
            } else {
                String::new()
            },
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::first()).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_backlog_remove(
    larder: &mut Larder,
    kind: MealKind,
    position: usize,
    json: bool,
) -> Result<()> {
    let index = parse_position(position)?;
    match larder.planner_mut().remove_from_backlog(kind, index) {
        Ok(removed) => {
            if json {
                print_json(&serde_json::json!({ "removed": removed }))
            } else {
                println!("Removed '{removed}'");
                Ok(())
            }
        }
        Err(PlanError::NoBacklogItem { .. }) => exit_not_found(
            &format!("No {} at position {position}", label(kind)),
            json,
        ),
        Err(e) => Err(e.into()),
    }
}

/// Remembered names for `query`, and what picking one would prefill.
pub(crate) fn cmd_backlog_suggest(
    larder: &Larder,
    kind: MealKind,
    query: &str,
    json: bool,
) -> Result<()> {
    let planner = larder.planner();
    let names = planner.suggestions(kind, query);
    if json {
        let prefills: Vec<_> = names
            .iter()
            .map(|n| planner.select_suggestion(kind, n))
            .collect();
        return print_json(&prefills);
    }
    if names.is_empty() {
        eprintln!("No suggestions for '{query}'");
        return Ok(());
    }
    for name in &names {
        let prefill = planner.select_suggestion(kind, name);
        if prefill.protein.is_empty() {
            println!("{}", prefill.name);
        } else {
            println!("{} ({})", prefill.name, prefill.protein);
        }
    }
    Ok(())
}
