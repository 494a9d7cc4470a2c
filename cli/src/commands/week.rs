use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use larder_core::models::DayName;
use larder_core::planner::MealKind;

use super::Larder;
use super::helpers::{parse_position, print_json};

pub(crate) fn cmd_week_show(larder: &Larder, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct DayRow {
        #[tabled(rename = "Day")]
        day: String,
        #[tabled(rename = "Meal")]
        meal: String,
    }

    let week = larder.planner().week();
    if json {
        return print_json(&week.days());
    }

    let rows: Vec<DayRow> = week
        .days()
        .iter()
        .map(|d| DayRow {
            day: d.day.to_string(),
            meal: if d.meal.is_empty() {
                "-".to_string()
            } else {
                d.meal.clone()
            },
        })
        .collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    println!("{}/7 days planned", week.planned_count());
    Ok(())
}

pub(crate) fn cmd_week_set(larder: &mut Larder, day: &str, meal: &str, json: bool) -> Result<()> {
    let day = DayName::parse(day)?;
    let planner = larder.planner_mut();
    planner.set_meal(day, meal);
    let planned = planner.week().meal(day).to_string();
    if json {
        print_json(&serde_json::json!({ "day": day, "meal": planned }))
    } else {
        println!("{day}: {planned}");
        Ok(())
    }
}

/// Clear one day, or the whole week when `day` is `None`.
pub(crate) fn cmd_week_clear(larder: &mut Larder, day: Option<&str>, json: bool) -> Result<()> {
    let planner = larder.planner_mut();
    match day {
        Some(d) => {
            let day = DayName::parse(d)?;
            planner.clear_meal(day);
            if json {
                print_json(&serde_json::json!({ "cleared": [day] }))
            } else {
                println!("Cleared {day}");
                Ok(())
            }
        }
        None => {
            planner.clear_all_meals();
            if json {
                print_json(&serde_json::json!({ "cleared": DayName::ALL }))
            } else {
                println!("Cleared the whole week");
                Ok(())
            }
        }
    }
}

/// Move backlog entry `position` (1-based) onto `day`.
pub(crate) fn cmd_week_place(
    larder: &mut Larder,
    kind: MealKind,
    position: usize,
    day: &str,
    json: bool,
) -> Result<()> {
    let day = DayName::parse(day)?;
    let index = parse_position(position)?;
    let meal = larder.planner_mut().place_idea(kind, index, day)?;
    if json {
        print_json(&serde_json::json!({ "day": day, "meal": meal }))
    } else {
        println!("Planned {meal} for {day}");
        Ok(())
    }
}
