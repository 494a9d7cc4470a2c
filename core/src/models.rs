use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// --- Week plan ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DayName {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayName {
    /// Display order of the week plan.
    pub const ALL: [DayName; 7] = [
        DayName::Sunday,
        DayName::Monday,
        DayName::Tuesday,
        DayName::Wednesday,
        DayName::Thursday,
        DayName::Friday,
        DayName::Saturday,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DayName::Sunday => "Sunday",
            DayName::Monday => "Monday",
            DayName::Tuesday => "Tuesday",
            DayName::Wednesday => "Wednesday",
            DayName::Thursday => "Thursday",
            DayName::Friday => "Friday",
            DayName::Saturday => "Saturday",
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Accepts full names, three-letter abbreviations, or a 0-6 index (0 = Sunday).
    pub fn parse(s: &str) -> Result<DayName> {
        let lower = s.trim().to_lowercase();
        let day = match lower.as_str() {
            "sunday" | "sun" | "0" => DayName::Sunday,
            "monday" | "mon" | "1" => DayName::Monday,
            "tuesday" | "tue" | "tues" | "2" => DayName::Tuesday,
            "wednesday" | "wed" | "3" => DayName::Wednesday,
            "thursday" | "thu" | "thurs" | "4" => DayName::Thursday,
            "friday" | "fri" | "5" => DayName::Friday,
            "saturday" | "sat" | "6" => DayName::Saturday,
            _ => bail!("Invalid day '{s}'. Use sunday-saturday, sun-sat, or 0-6"),
        };
        Ok(day)
    }
}

impl std::fmt::Display for DayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day: DayName,
    #[serde(default)]
    pub meal: String,
}

/// Seven dinner slots, always Sunday through Saturday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<DayPlan>", into = "Vec<DayPlan>")]
pub struct WeekPlan {
    days: Vec<DayPlan>,
}

impl Default for WeekPlan {
    fn default() -> Self {
        Self {
            days: DayName::ALL
                .iter()
                .map(|&day| DayPlan {
                    day,
                    meal: String::new(),
                })
                .collect(),
        }
    }
}

impl From<Vec<DayPlan>> for WeekPlan {
    /// Slots are matched by day name, so out-of-order or partial input still
    /// yields a full Sunday-first week. Duplicate days keep the last value.
    fn from(days: Vec<DayPlan>) -> Self {
        let mut week = WeekPlan::default();
        for plan in days {
            week.days[plan.day.index()].meal = plan.meal;
        }
        week
    }
}

impl From<WeekPlan> for Vec<DayPlan> {
    fn from(week: WeekPlan) -> Self {
        week.days
    }
}

impl WeekPlan {
    #[must_use]
    pub fn days(&self) -> &[DayPlan] {
        &self.days
    }

    #[must_use]
    pub fn meal(&self, day: DayName) -> &str {
        &self.days[day.index()].meal
    }

    pub fn set_meal(&mut self, day: DayName, meal: &str) {
        self.days[day.index()].meal = meal.to_string();
    }

    pub fn clear_all(&mut self) {
        for d in &mut self.days {
            d.meal.clear();
        }
    }

    #[must_use]
    pub fn planned_count(&self) -> usize {
        self.days.iter().filter(|d| !d.meal.trim().is_empty()).count()
    }
}

// --- Recipes ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngredientRow {
    pub qty: String,
    pub unit: String,
    pub item: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recipe {
    pub name: String,
    pub protein: String,
    pub instructions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prep_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cook_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
    pub ingredients: Vec<IngredientRow>,
}

impl Recipe {
    #[must_use]
    pub fn total_minutes(&self) -> Option<u32> {
        match (self.prep_minutes, self.cook_minutes) {
            (None, None) => None,
            (p, c) => Some(p.unwrap_or(0) + c.unwrap_or(0)),
        }
    }
}

// --- Groceries ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroceryItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub qty: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default = "default_store")]
    pub store: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub added_date: String,
    #[serde(default)]
    pub product_url: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_recipe: Option<String>,
}

fn default_store() -> String {
    crate::shops::UNCATEGORIZED.to_string()
}

/// Last-used values for an item name, offered again when the name is re-added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroceryDefaults {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub unit: String,
    pub store: String,
    pub product_url: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewGroceryItem {
    pub name: String,
    pub qty: String,
    pub unit: String,
    pub store: String,
    pub product_url: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroceryEdit {
    pub name: Option<String>,
    pub qty: Option<String>,
    pub unit: Option<String>,
    pub store: Option<String>,
    pub product_url: Option<String>,
    pub notes: Option<String>,
}

impl GroceryEdit {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.qty.is_none()
            && self.unit.is_none()
            && self.store.is_none()
            && self.product_url.is_none()
            && self.notes.is_none()
    }
}

// --- Validation ---

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Item name is required.")]
    MissingName,
    #[error("Quantity must be a number (got '{0}').")]
    InvalidQuantity(String),
    #[error("Product link must start with http:// or https:// (got '{0}').")]
    InvalidUrl(String),
}

/// Quantities travel as strings; they must be empty or a plain decimal number.
pub fn validate_quantity(qty: &str) -> Result<String, FormError> {
    let qty = qty.trim();
    if qty.is_empty() {
        return Ok(String::new());
    }
    let dots = qty.chars().filter(|&c| c == '.').count();
    let all_numeric = qty.chars().all(|c| c.is_ascii_digit() || c == '.');
    let has_digit = qty.chars().any(|c| c.is_ascii_digit());
    if all_numeric && has_digit && dots <= 1 {
        Ok(qty.to_string())
    } else {
        Err(FormError::InvalidQuantity(qty.to_string()))
    }
}

pub fn validate_name(name: &str) -> Result<String, FormError> {
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        Err(FormError::MissingName)
    } else {
        Ok(name)
    }
}

pub fn validate_product_url(url: &str) -> Result<String, FormError> {
    let url = url.trim();
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.to_string())
    } else {
        Err(FormError::InvalidUrl(url.to_string()))
    }
}

// --- Name helpers ---

/// "chicken  TIKKA masala" -> "Chicken Tikka Masala".
#[must_use]
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Path segments cannot contain `. # $ [ ] /`; those become `_`.
#[must_use]
pub fn sanitize_key(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '.' | '#' | '$' | '[' | ']' | '/' => '_',
            c => c,
        })
        .collect()
}

/// `Oct-16` style label stored on grocery items.
#[must_use]
pub fn added_date_label(date: NaiveDate) -> String {
    date.format("%b-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_parse_variants() {
        assert_eq!(DayName::parse("sunday").unwrap(), DayName::Sunday);
        assert_eq!(DayName::parse("Wed").unwrap(), DayName::Wednesday);
        assert_eq!(DayName::parse("6").unwrap(), DayName::Saturday);
        assert_eq!(DayName::parse(" THURS ").unwrap(), DayName::Thursday);
        assert!(DayName::parse("someday").is_err());
    }

    #[test]
    fn test_week_default_is_sunday_first() {
        let week = WeekPlan::default();
        let names: Vec<&str> = week.days().iter().map(|d| d.day.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Sunday",
                "Monday",
                "Tuesday",
                "Wednesday",
                "Thursday",
                "Friday",
                "Saturday"
            ]
        );
        assert!(week.days().iter().all(|d| d.meal.is_empty()));
    }

    #[test]
    fn test_week_from_partial_out_of_order() {
        let week = WeekPlan::from(vec![
            DayPlan {
                day: DayName::Friday,
                meal: "Pizza".to_string(),
            },
            DayPlan {
                day: DayName::Monday,
                meal: "Tacos".to_string(),
            },
        ]);
        assert_eq!(week.days().len(), 7);
        assert_eq!(week.days()[1].meal, "Tacos");
        assert_eq!(week.days()[5].meal, "Pizza");
        assert_eq!(week.meal(DayName::Sunday), "");
        assert_eq!(week.planned_count(), 2);
    }

    #[test]
    fn test_week_serializes_as_sequence() {
        let mut week = WeekPlan::default();
        week.set_meal(DayName::Tuesday, "Stir Fry");
        let json = serde_json::to_value(&week).unwrap();
        let arr = json.as_array().unwrap();
        assert_eq!(arr.len(), 7);
        assert_eq!(arr[2]["day"], "Tuesday");
        assert_eq!(arr[2]["meal"], "Stir Fry");

        let back: WeekPlan = serde_json::from_value(json).unwrap();
        assert_eq!(back, week);
    }

    #[test]
    fn test_week_clear_all() {
        let mut week = WeekPlan::default();
        week.set_meal(DayName::Monday, "Soup");
        week.set_meal(DayName::Friday, "Fish");
        week.clear_all();
        assert_eq!(week.planned_count(), 0);
    }

    #[test]
    fn test_validate_quantity() {
        assert_eq!(validate_quantity("").unwrap(), "");
        assert_eq!(validate_quantity(" 2 ").unwrap(), "2");
        assert_eq!(validate_quantity("1.5").unwrap(), "1.5");
        assert_eq!(validate_quantity(".5").unwrap(), ".5");
        assert!(validate_quantity("two").is_err());
        assert!(validate_quantity("1.2.3").is_err());
        assert!(validate_quantity(".").is_err());
        assert!(validate_quantity("-1").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  chicken   breast ").unwrap(), "chicken breast");
        assert_eq!(validate_name("   "), Err(FormError::MissingName));
    }

    #[test]
    fn test_validate_product_url() {
        assert!(validate_product_url("").is_ok());
        assert!(validate_product_url("https://www.costco.com/milk").is_ok());
        assert!(validate_product_url("costco.com").is_err());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("tacos"), "Tacos");
        assert_eq!(title_case("chicken  TIKKA masala"), "Chicken Tikka Masala");
        assert_eq!(title_case("  "), "");
        assert_eq!(title_case("crème brûlée"), "Crème Brûlée");
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("Mr. Pibb"), "Mr_ Pibb");
        assert_eq!(sanitize_key("a/b#c$d[e]"), "a_b_c_d_e_");
        assert_eq!(sanitize_key("Milk"), "Milk");
    }

    #[test]
    fn test_added_date_label() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 6).unwrap();
        assert_eq!(added_date_label(date), "Oct-06");
    }

    #[test]
    fn test_grocery_item_camel_case_wire_format() {
        let json = serde_json::json!({
            "id": "1700000000000",
            "name": "Milk",
            "qty": "1",
            "unit": "gal",
            "store": "Costco",
            "checked": false,
            "addedDate": "Oct-16",
            "productUrl": "",
            "notes": "",
            "sourceRecipe": "Pancakes"
        });
        let item: GroceryItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.added_date, "Oct-16");
        assert_eq!(item.source_recipe.as_deref(), Some("Pancakes"));
    }

    #[test]
    fn test_grocery_item_missing_fields_default() {
        let item: GroceryItem =
            serde_json::from_value(serde_json::json!({ "id": "1", "name": "Eggs" })).unwrap();
        assert_eq!(item.store, "Uncategorized");
        assert!(!item.checked);
        assert!(item.source_recipe.is_none());
    }

    #[test]
    fn test_recipe_total_minutes() {
        let mut r = Recipe::default();
        assert_eq!(r.total_minutes(), None);
        r.prep_minutes = Some(10);
        assert_eq!(r.total_minutes(), Some(10));
        r.cook_minutes = Some(25);
        assert_eq!(r.total_minutes(), Some(35));
    }
}
