use anyhow::{Context, Result, bail};
use chrono::Local;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::models::{IngredientRow, Recipe};
use larder_core::planner::{MealKind, PlanError};

use super::Larder;
use super::helpers::{exit_not_found, or_dash, parse_ingredient, parse_position, print_json, truncate};

pub(crate) struct RecipeInput {
    pub protein: Option<String>,
    pub instructions: Option<String>,
    pub prep_minutes: Option<u32>,
    pub cook_minutes: Option<u32>,
    pub servings: Option<u32>,
    pub ingredients: Vec<String>,
}

/// Create or replace a recipe. Fields not given keep their saved values;
/// `--ingredient` replaces the whole ingredient list.
pub(crate) fn cmd_recipe_save(
    larder: &mut Larder,
    kind: MealKind,
    name: &str,
    input: RecipeInput,
    json: bool,
) -> Result<()> {
    let mut recipe = larder
        .planner()
        .recipe(kind, name)
        .cloned()
        .unwrap_or_default();
    if let Some(p) = input.protein {
        recipe.protein = p;
    }
    if let Some(i) = input.instructions {
        recipe.instructions = i;
    }
    if input.prep_minutes.is_some() {
        recipe.prep_minutes = input.prep_minutes;
    }
    if input.cook_minutes.is_some() {
        recipe.cook_minutes = input.cook_minutes;
    }
    if input.servings.is_some() {
        recipe.servings = input.servings;
    }
    if !input.ingredients.is_empty() {
        recipe.ingredients = input
            .ingredients
            .iter()
            .map(|s| parse_ingredient(s))
            .collect::<Result<_>>()?;
    }

    let saved = larder.planner_mut().save_recipe(kind, name, recipe)?;
    if json {
        print_json(&saved)
    } else {
        println!(
            "Saved {kind} recipe: {} ({} ingredients)",
            saved.name,
            saved.ingredients.len()
        );
        Ok(())
    }
}

pub(crate) fn cmd_recipe_show(larder: &Larder, kind: MealKind, name: &str, json: bool) -> Result<()> {
    let Some(recipe) = larder.planner().recipe(kind, name) else {
        exit_not_found(&format!("No {kind} recipe named '{name}'"), json);
    };
    if json {
        return print_json(recipe);
    }

    println!("=== {} ===", recipe.name);
    if !recipe.protein.is_empty() {
        println!("  Protein: {}", recipe.protein);
    }
    println!(
        "  Prep: {}  |  Cook: {}  |  Total: {}  |  Serves: {}",
        minutes(recipe.prep_minutes),
        minutes(recipe.cook_minutes),
        minutes(recipe.total_minutes()),
        or_dash(recipe.servings)
    );

    if !recipe.ingredients.is_empty() {
        println!("\n  INGREDIENTS:");
        for (i, row) in recipe.ingredients.iter().enumerate() {
            let amount = [row.qty.as_str(), row.unit.as_str()]
                .iter()
                .filter(|s| !s.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
            if amount.is_empty() {
                println!("    {}. {}", i + 1, row.item);
            } else {
                println!("    {}. {amount} {}", i + 1, row.item);
            }
        }
    }
    if !recipe.instructions.trim().is_empty() {
        println!("\n  INSTRUCTIONS:");
        for line in recipe.instructions.lines() {
            println!("    {line}");
        }
    }
    Ok(())
}

fn minutes(m: Option<u32>) -> String {
    m.map_or_else(|| "-".to_string(), |m| format!("{m} min"))
}

pub(crate) fn cmd_recipe_list(larder: &Larder, kind: MealKind, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Ingredients")]
        ingredients: usize,
        #[tabled(rename = "Total time")]
        total: String,
        #[tabled(rename = "Serves")]
        servings: String,
    }

    let recipes = larder.planner().recipes(kind);
    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No {kind} recipes found");
        }
        std::process::exit(2);
    }

    let mut list: Vec<&Recipe> = recipes.values().collect();
    list.sort_by_key(|r| r.name.to_lowercase());
    if json {
        return print_json(&list);
    }

    let rows: Vec<RecipeRow> = list
        .iter()
        .map(|r| RecipeRow {
            name: truncate(&r.name, 30),
            protein: truncate(&r.protein, 15),
            ingredients: r.ingredients.len(),
            total: minutes(r.total_minutes()),
            servings: or_dash(r.servings),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_recipe_delete(
    larder: &mut Larder,
    kind: MealKind,
    name: &str,
    json: bool,
) -> Result<()> {
    match larder.planner_mut().delete_recipe(kind, name) {
        Ok(removed) => {
            if json {
                print_json(&serde_json::json!({ "deleted": removed.name }))
            } else {
                println!("Deleted {kind} recipe: {}", removed.name);
                Ok(())
            }
        }
        Err(PlanError::NoRecipe { .. }) => {
            exit_not_found(&format!("No {kind} recipe named '{name}'"), json)
        }
        Err(e) => Err(e.into()),
    }
}

/// Copy one ingredient (1-based `row`) or the whole recipe onto the grocery list.
pub(crate) fn cmd_recipe_to_grocery(
    larder: &mut Larder,
    kind: MealKind,
    name: &str,
    row: Option<usize>,
    json: bool,
) -> Result<()> {
    let now = Local::now();
    let result = match row {
        Some(position) => {
            let index = parse_position(position)?;
            larder
                .add_ingredient_to_groceries(kind, name, index, now)
                .map(|item| vec![item])
        }
        None => larder.add_recipe_to_groceries(kind, name, now),
    };

    let added = match result {
        Ok(added) => added,
        Err(PlanError::NoRecipe { .. }) => {
            exit_not_found(&format!("No {kind} recipe named '{name}'"), json)
        }
        Err(PlanError::NoIngredient { recipe, .. }) => exit_not_found(
            &format!(
                "Recipe '{recipe}' has no ingredient at position {}",
                row.unwrap_or_default()
            ),
            json,
        ),
        Err(e) => return Err(e.into()),
    };

    if json {
        return print_json(&added);
    }
    if added.is_empty() {
        println!("Nothing to add: the recipe has no ingredients");
    } else {
        for item in &added {
            println!("Added {} {} {} ({})", item.qty, item.unit, item.name, item.store);
        }
    }
    Ok(())
}

/// Import a Cooklang (.cook) file as a recipe.
pub(crate) fn cmd_recipe_import(
    larder: &mut Larder,
    kind: MealKind,
    file: &std::path::Path,
    name_override: Option<String>,
    protein: Option<String>,
    json: bool,
) -> Result<()> {
    let input = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;

    let (recipe_data, _report) = cooklang::parse(&input)
        .into_result()
        .map_err(|e| anyhow::anyhow!("Failed to parse Cooklang file: {e}"))?;

    let name = name_override
        .or_else(|| recipe_data.metadata.title().map(String::from))
        .or_else(|| file.file_stem().and_then(|s| s.to_str()).map(String::from))
        .context("Could not determine recipe name. Use --name to specify one")?;

    let servings = recipe_data
        .metadata
        .servings()
        .and_then(|s| s.as_number().map(f64::from))
        .and_then(whole_servings);

    let converter = cooklang::Converter::default();
    let grouped = recipe_data.group_ingredients(&converter);
    let ingredients: Vec<IngredientRow> = grouped.iter().map(cooklang_ingredient_row).collect();
    if ingredients.is_empty() {
        bail!("No ingredients found in recipe");
    }

    let mut steps = Vec::new();
    for section in &recipe_data.sections {
        for content in &section.content {
            let cooklang::Content::Step(step) = content else {
                continue;
            };
            let mut text = String::new();
            for item in &step.items {
                match item {
                    cooklang::Item::Text { value } => text.push_str(value),
                    cooklang::Item::Ingredient { index } => {
                        text.push_str(&recipe_data.ingredients[*index].display_name());
                    }
                    cooklang::Item::Cookware { index } => {
                        text.push_str(&recipe_data.cookware[*index].name);
                    }
                    _ => {}
                }
            }
            let text = text.trim();
            if !text.is_empty() {
                steps.push(format!("{}. {text}", steps.len() + 1));
            }
        }
    }

    let recipe = Recipe {
        protein: protein.unwrap_or_default(),
        instructions: steps.join("\n"),
        servings,
        ingredients,
        ..Recipe::default()
    };
    let saved = larder.planner_mut().save_recipe(kind, &name, recipe)?;

    if json {
        print_json(&saved)
    } else {
        println!(
            "Imported {kind} recipe: {} ({} ingredients)",
            saved.name,
            saved.ingredients.len()
        );
        Ok(())
    }
}

/// Quantities that are not plain numbers ("a pinch") move into the unit column.
fn cooklang_ingredient_row(gi: &cooklang::ingredient_list::GroupedIngredient<'_>) -> IngredientRow {
    let (qty, unit) = gi
        .quantity
        .iter()
        .next()
        .map_or((String::new(), String::new()), |q: &cooklang::Quantity| {
            let unit = q.unit().unwrap_or_default().to_string();
            match q.value() {
                cooklang::Value::Number(n) => (format_qty(n.value()), unit),
                cooklang::Value::Range { start, .. } => (format_qty(start.value()), unit),
                cooklang::Value::Text(t) => {
                    let text = [t.as_str(), unit.as_str()]
                        .iter()
                        .filter(|s| !s.is_empty())
                        .copied()
                        .collect::<Vec<_>>()
                        .join(" ");
                    (String::new(), text)
                }
            }
        });

    IngredientRow {
        qty,
        unit,
        item: gi.ingredient.display_name().to_string(),
    }
}

#[allow(clippy::cast_sign_loss)]
fn whole_servings(n: f64) -> Option<u32> {
    let n = n.round();
    (1.0..=f64::from(u32::MAX)).contains(&n).then(|| n as u32)
}

fn format_qty(v: f64) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    if rounded < 0.0 {
        String::new()
    } else {
        format!("{rounded}")
    }
}
