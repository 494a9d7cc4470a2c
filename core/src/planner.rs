use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::grocery::{GroceryHistory, transfer_ingredients};
use crate::history::HistoryDictionary;
use crate::models::{
    DayName, DayPlan, FormError, GroceryItem, IngredientRow, Recipe, WeekPlan, sanitize_key,
    title_case, validate_name, validate_quantity,
};
use crate::store::DocumentStore;
use crate::sync::{Subtree, SyncController, decode_map, decode_sequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealKind {
    Dinner,
    Lunch,
}

impl MealKind {
    #[must_use]
    pub fn backlog(self) -> Subtree {
        match self {
            MealKind::Dinner => Subtree::Ideas,
            MealKind::Lunch => Subtree::LunchPrep,
        }
    }

    #[must_use]
    pub fn history(self) -> Subtree {
        match self {
            MealKind::Dinner => Subtree::MealHistory,
            MealKind::Lunch => Subtree::LunchHistory,
        }
    }

    #[must_use]
    pub fn recipes(self) -> Subtree {
        match self {
            MealKind::Dinner => Subtree::Recipes,
            MealKind::Lunch => Subtree::LunchRecipes,
        }
    }
}

impl fmt::Display for MealKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MealKind::Dinner => f.write_str("dinner"),
            MealKind::Lunch => f.write_str("lunch"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("No {kind} backlog item at position {index}")]
    NoBacklogItem { kind: MealKind, index: usize },
    #[error("No {kind} recipe named '{name}'")]
    NoRecipe { kind: MealKind, name: String },
    #[error("Recipe '{recipe}' has no ingredient at position {index}")]
    NoIngredient { recipe: String, index: usize },
    #[error("Planner is still loading; try again once every section has loaded")]
    NotLoaded,
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// What picking a remembered meal fills in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MealPrefill {
    pub name: String,
    pub protein: String,
    pub ingredients: Vec<IngredientRow>,
}

/// The meal planner view: week plan, both backlogs, their histories and
/// recipe books, plus grocery history for ingredient transfer.
pub struct MealPlanner<S: DocumentStore> {
    sync: SyncController<S>,
    week: WeekPlan,
    ideas: Vec<String>,
    lunch: Vec<String>,
    meal_history: HistoryDictionary,
    lunch_history: HistoryDictionary,
    recipes: BTreeMap<String, Recipe>,
    lunch_recipes: BTreeMap<String, Recipe>,
    grocery_history: GroceryHistory,
}

impl<S: DocumentStore> MealPlanner<S> {
    pub const TRACKED: [Subtree; 8] = [
        Subtree::CurrentWeek,
        Subtree::Ideas,
        Subtree::LunchPrep,
        Subtree::MealHistory,
        Subtree::LunchHistory,
        Subtree::Recipes,
        Subtree::LunchRecipes,
        Subtree::GroceryHistory,
    ];

    pub fn new(store: Arc<S>) -> Self {
        Self {
            sync: SyncController::new(store, &Self::TRACKED),
            week: WeekPlan::default(),
            ideas: Vec::new(),
            lunch: Vec::new(),
            meal_history: HistoryDictionary::new(),
            lunch_history: HistoryDictionary::new(),
            recipes: BTreeMap::new(),
            lunch_recipes: BTreeMap::new(),
            grocery_history: GroceryHistory::new(),
        }
    }

    /// Read every tracked subtree once; the gate is open afterwards.
    pub fn mount(store: Arc<S>) -> Self {
        let mut planner = Self::new(store);
        for subtree in Self::TRACKED {
            planner.load(subtree);
        }
        planner
    }

    /// Initial read of one subtree. Stored data replaces whatever the mirror
    /// holds. When this completes the last read, edits made in the meantime
    /// are written out.
    pub fn load(&mut self, subtree: Subtree) {
        if let Some(value) = self.sync.read_initial(subtree) {
            match subtree {
                Subtree::CurrentWeek => {
                    self.week = WeekPlan::from(decode_sequence::<DayPlan>(&value, "week plan"));
                }
                Subtree::Ideas => self.ideas = decode_sequence(&value, "ideas"),
                Subtree::LunchPrep => self.lunch = decode_sequence(&value, "lunch prep"),
                Subtree::MealHistory => {
                    self.meal_history = decode_map::<String>(&value, "meal history").into();
                }
                Subtree::LunchHistory => {
                    self.lunch_history = decode_map::<String>(&value, "lunch history").into();
                }
                Subtree::Recipes => self.recipes = decode_map(&value, "recipes"),
                Subtree::LunchRecipes => self.lunch_recipes = decode_map(&value, "lunch recipes"),
                Subtree::GroceryHistory => {
                    self.grocery_history = decode_map(&value, "grocery history");
                }
                Subtree::GroceryList => {}
            }
        }
        for dirty in self.sync.take_flush() {
            self.persist(dirty);
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.sync.all_loaded()
    }

    pub fn pending(&self) -> Vec<Subtree> {
        self.sync.gate().pending()
    }

    fn persist(&mut self, subtree: Subtree) {
        match subtree {
            Subtree::CurrentWeek => self.sync.write_serialized(subtree, &self.week),
            Subtree::Ideas => self.sync.write_serialized(subtree, &self.ideas),
            Subtree::LunchPrep => self.sync.write_serialized(subtree, &self.lunch),
            Subtree::MealHistory => self.sync.write_serialized(subtree, &self.meal_history),
            Subtree::LunchHistory => self.sync.write_serialized(subtree, &self.lunch_history),
            Subtree::Recipes => self.sync.write_serialized(subtree, &self.recipes),
            Subtree::LunchRecipes => self.sync.write_serialized(subtree, &self.lunch_recipes),
            Subtree::GroceryHistory => self.sync.write_serialized(subtree, &self.grocery_history),
            Subtree::GroceryList => false,
        };
    }

    // --- Week ---

    pub fn week(&self) -> &WeekPlan {
        &self.week
    }

    pub fn set_meal(&mut self, day: DayName, meal: &str) {
        let meal = meal.trim();
        self.week.set_meal(day, meal);
        self.persist(Subtree::CurrentWeek);
        if self.meal_history.insert(meal) {
            self.persist(Subtree::MealHistory);
        }
    }

    pub fn clear_meal(&mut self, day: DayName) {
        self.week.set_meal(day, "");
        self.persist(Subtree::CurrentWeek);
    }

    pub fn clear_all_meals(&mut self) {
        self.week.clear_all();
        self.persist(Subtree::CurrentWeek);
    }

    // --- Backlogs ---

    pub fn backlog(&self, kind: MealKind) -> &[String] {
        match kind {
            MealKind::Dinner => &self.ideas,
            MealKind::Lunch => &self.lunch,
        }
    }

    fn backlog_mut(&mut self, kind: MealKind) -> &mut Vec<String> {
        match kind {
            MealKind::Dinner => &mut self.ideas,
            MealKind::Lunch => &mut self.lunch,
        }
    }

    pub fn history(&self, kind: MealKind) -> &HistoryDictionary {
        match kind {
            MealKind::Dinner => &self.meal_history,
            MealKind::Lunch => &self.lunch_history,
        }
    }

    fn history_mut(&mut self, kind: MealKind) -> &mut HistoryDictionary {
        match kind {
            MealKind::Dinner => &mut self.meal_history,
            MealKind::Lunch => &mut self.lunch_history,
        }
    }

    pub fn add_to_backlog(&mut self, kind: MealKind, text: &str) -> Result<String, PlanError> {
        let entry = validate_name(text)?;
        self.backlog_mut(kind).push(entry.clone());
        self.persist(kind.backlog());
        if self.history_mut(kind).insert(&entry) {
            self.persist(kind.history());
        }
        Ok(entry)
    }

    pub fn remove_from_backlog(&mut self, kind: MealKind, index: usize) -> Result<String, PlanError> {
        let backlog = self.backlog_mut(kind);
        if index >= backlog.len() {
            return Err(PlanError::NoBacklogItem { kind, index });
        }
        let removed = backlog.remove(index);
        self.persist(kind.backlog());
        Ok(removed)
    }

    /// Move a backlog entry onto `day`, replacing whatever was planned there.
    pub fn place_idea(
        &mut self,
        kind: MealKind,
        index: usize,
        day: DayName,
    ) -> Result<String, PlanError> {
        let backlog = self.backlog_mut(kind);
        if index >= backlog.len() {
            return Err(PlanError::NoBacklogItem { kind, index });
        }
        let meal = backlog.remove(index);
        self.week.set_meal(day, &meal);
        self.persist(Subtree::CurrentWeek);
        self.persist(kind.backlog());
        Ok(meal)
    }

    /// Remembered names containing `query`, minus those already waiting in
    /// the same backlog.
    pub fn suggestions(&self, kind: MealKind, query: &str) -> Vec<String> {
        self.history(kind).suggest(query, self.backlog(kind))
    }

    pub fn select_suggestion(&self, kind: MealKind, name: &str) -> MealPrefill {
        match self.recipe(kind, name) {
            Some(r) => MealPrefill {
                name: r.name.clone(),
                protein: r.protein.clone(),
                ingredients: r.ingredients.clone(),
            },
            None => MealPrefill {
                name: title_case(name),
                ..MealPrefill::default()
            },
        }
    }

    // --- Recipes ---

    pub fn recipes(&self, kind: MealKind) -> &BTreeMap<String, Recipe> {
        match kind {
            MealKind::Dinner => &self.recipes,
            MealKind::Lunch => &self.lunch_recipes,
        }
    }

    fn recipes_mut(&mut self, kind: MealKind) -> &mut BTreeMap<String, Recipe> {
        match kind {
            MealKind::Dinner => &mut self.recipes,
            MealKind::Lunch => &mut self.lunch_recipes,
        }
    }

    fn recipe_key(&self, kind: MealKind, name: &str) -> Option<String> {
        let key = sanitize_key(&title_case(name));
        let book = self.recipes(kind);
        if book.contains_key(&key) {
            return Some(key);
        }
        let lower = name.trim().to_lowercase();
        book.iter()
            .find(|(k, r)| k.to_lowercase() == lower || r.name.to_lowercase() == lower)
            .map(|(k, _)| k.clone())
    }

    pub fn recipe(&self, kind: MealKind, name: &str) -> Option<&Recipe> {
        let key = self.recipe_key(kind, name)?;
        self.recipes(kind).get(&key)
    }

    /// Store `recipe` under the title-cased `name`, replacing any previous
    /// version. Blank ingredient rows are dropped; quantities must be numeric.
    pub fn save_recipe(
        &mut self,
        kind: MealKind,
        name: &str,
        mut recipe: Recipe,
    ) -> Result<Recipe, PlanError> {
        let display = title_case(&validate_name(name)?);
        let mut rows = Vec::with_capacity(recipe.ingredients.len());
        for row in recipe.ingredients {
            if row.qty.trim().is_empty() && row.unit.trim().is_empty() && row.item.trim().is_empty()
            {
                continue;
            }
            rows.push(IngredientRow {
                qty: validate_quantity(&row.qty)?,
                unit: row.unit.trim().to_string(),
                item: row.item.trim().to_string(),
            });
        }
        recipe.ingredients = rows;
        recipe.name.clone_from(&display);
        recipe.protein = recipe.protein.trim().to_string();

        self.recipes_mut(kind)
            .insert(sanitize_key(&display), recipe.clone());
        self.persist(kind.recipes());
        if self.history_mut(kind).insert(&display) {
            self.persist(kind.history());
        }
        Ok(recipe)
    }

    pub fn delete_recipe(&mut self, kind: MealKind, name: &str) -> Result<Recipe, PlanError> {
        let key = self.recipe_key(kind, name).ok_or_else(|| PlanError::NoRecipe {
            kind,
            name: name.to_string(),
        })?;
        let removed = self
            .recipes_mut(kind)
            .remove(&key)
            .ok_or_else(|| PlanError::NoRecipe {
                kind,
                name: name.to_string(),
            })?;
        self.persist(kind.recipes());
        Ok(removed)
    }

    // --- Ingredient transfer ---

    pub fn grocery_history(&self) -> &GroceryHistory {
        &self.grocery_history
    }

    fn transfer(
        &mut self,
        recipe_name: &str,
        rows: &[IngredientRow],
        now: DateTime<Local>,
    ) -> Result<Vec<GroceryItem>, PlanError> {
        if !self.sync.all_loaded() {
            return Err(PlanError::NotLoaded);
        }
        if let Some(latest) = self.sync.read_latest(Subtree::GroceryHistory)? {
            self.grocery_history = decode_map(&latest, "grocery history");
        }
        let store = Arc::clone(self.sync.store());
        let added = transfer_ingredients(
            store.as_ref(),
            rows,
            recipe_name,
            &mut self.grocery_history,
            now,
        )?;
        if !added.is_empty() {
            self.persist(Subtree::GroceryHistory);
        }
        Ok(added)
    }

    /// Copy one ingredient row of a recipe onto the grocery list.
    pub fn add_ingredient_to_groceries(
        &mut self,
        kind: MealKind,
        recipe_name: &str,
        row: usize,
        now: DateTime<Local>,
    ) -> Result<GroceryItem, PlanError> {
        let recipe = self
            .recipe(kind, recipe_name)
            .ok_or_else(|| PlanError::NoRecipe {
                kind,
                name: recipe_name.to_string(),
            })?
            .clone();
        let ingredient = recipe
            .ingredients
            .get(row)
            .filter(|r| !r.item.trim().is_empty())
            .cloned()
            .ok_or_else(|| PlanError::NoIngredient {
                recipe: recipe.name.clone(),
                index: row,
            })?;
        let mut added = self.transfer(&recipe.name, &[ingredient], now)?;
        added.pop().ok_or(PlanError::NoIngredient {
            recipe: recipe.name,
            index: row,
        })
    }

    /// Copy every non-blank ingredient row of a recipe in one list write.
    pub fn add_recipe_to_groceries(
        &mut self,
        kind: MealKind,
        recipe_name: &str,
        now: DateTime<Local>,
    ) -> Result<Vec<GroceryItem>, PlanError> {
        let recipe = self
            .recipe(kind, recipe_name)
            .ok_or_else(|| PlanError::NoRecipe {
                kind,
                name: recipe_name.to_string(),
            })?
            .clone();
        self.transfer(&recipe.name, &recipe.ingredients, now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;
    use crate::store::testing::SpyStore;

    fn at(ms: i64) -> DateTime<Local> {
        Local.timestamp_millis_opt(ms).unwrap()
    }

    fn row(qty: &str, unit: &str, item: &str) -> IngredientRow {
        IngredientRow {
            qty: qty.to_string(),
            unit: unit.to_string(),
            item: item.to_string(),
        }
    }

    fn tikka() -> Recipe {
        Recipe {
            protein: "Chicken".to_string(),
            instructions: "Marinate, then simmer.".to_string(),
            prep_minutes: Some(20),
            cook_minutes: Some(30),
            servings: Some(4),
            ingredients: vec![row("2", "lbs", "chicken thighs"), row("1", "cups", "yogurt")],
            ..Recipe::default()
        }
    }

    #[test]
    fn test_no_writes_until_every_subtree_loaded() {
        let store = Arc::new(SpyStore::new());
        let mut planner = MealPlanner::new(store.clone());

        for subtree in &MealPlanner::<SpyStore>::TRACKED[..7] {
            planner.load(*subtree);
            planner.set_meal(DayName::Monday, "Tacos");
            planner.add_to_backlog(MealKind::Dinner, "Chili").unwrap();
            assert_eq!(store.write_count(), 0, "wrote before {subtree:?} settled");
        }
        assert_eq!(planner.pending(), vec![Subtree::GroceryHistory]);

        planner.load(Subtree::GroceryHistory);
        assert!(planner.is_loaded());
        assert!(store.write_count() > 0);
        let stored = store.read(Subtree::CurrentWeek.path()).unwrap().unwrap();
        assert_eq!(stored[1]["meal"], "Tacos");
    }

    #[test]
    fn test_remote_data_wins_over_early_edits() {
        let store = Arc::new(SpyStore::new());
        store.seed(Subtree::Ideas.path(), json!(["Remote Idea"]));
        let mut planner = MealPlanner::new(store.clone());
        planner.add_to_backlog(MealKind::Dinner, "Local Idea").unwrap();
        for subtree in MealPlanner::<SpyStore>::TRACKED {
            planner.load(subtree);
        }
        assert_eq!(planner.backlog(MealKind::Dinner), ["Remote Idea"]);
        assert!(!store.written_paths().contains(&Subtree::Ideas.path().to_string()));
    }

    #[test]
    fn test_failed_reads_keep_defaults_and_open_gate() {
        let store = Arc::new(SpyStore::new());
        store.seed(Subtree::Ideas.path(), json!(["Hidden"]));
        store.set_fail_reads(true);
        let planner = MealPlanner::mount(store.clone());
        assert!(planner.is_loaded());
        assert!(planner.backlog(MealKind::Dinner).is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_week_round_trip_through_store() {
        let store = Arc::new(MemoryStore::new());
        let mut planner = MealPlanner::mount(store.clone());
        planner.set_meal(DayName::Sunday, "Roast");
        planner.set_meal(DayName::Saturday, "Pizza");

        let reloaded = MealPlanner::mount(store);
        let days = reloaded.week().days();
        assert_eq!(days.len(), 7);
        assert_eq!(days, planner.week().days());
        assert_eq!(days[0].day, DayName::Sunday);
        assert_eq!(days[6].meal, "Pizza");
    }

    #[test]
    fn test_week_loads_from_object_form() {
        let store = Arc::new(MemoryStore::new());
        store
            .write(
                Subtree::CurrentWeek.path(),
                &json!({"0": {"day": "Sunday", "meal": "Soup"}, "3": {"day": "Wednesday", "meal": "Curry"}}),
            )
            .unwrap();
        let planner = MealPlanner::mount(store);
        assert_eq!(planner.week().meal(DayName::Sunday), "Soup");
        assert_eq!(planner.week().meal(DayName::Wednesday), "Curry");
        assert_eq!(planner.week().days().len(), 7);
    }

    #[test]
    fn test_place_idea_moves_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let mut planner = MealPlanner::mount(store.clone());
        planner.add_to_backlog(MealKind::Dinner, "Tacos").unwrap();
        planner.add_to_backlog(MealKind::Dinner, "Chili").unwrap();
        planner.add_to_backlog(MealKind::Dinner, "Tacos").unwrap();
        planner.set_meal(DayName::Tuesday, "Leftovers");

        let placed = planner.place_idea(MealKind::Dinner, 0, DayName::Tuesday).unwrap();
        assert_eq!(placed, "Tacos");
        assert_eq!(planner.week().meal(DayName::Tuesday), "Tacos");
        assert_eq!(planner.backlog(MealKind::Dinner), ["Chili", "Tacos"]);
        assert_eq!(
            store.read(Subtree::Ideas.path()).unwrap(),
            Some(json!(["Chili", "Tacos"]))
        );
        assert!(matches!(
            planner.place_idea(MealKind::Dinner, 5, DayName::Monday),
            Err(PlanError::NoBacklogItem { index: 5, .. })
        ));
    }

    #[test]
    fn test_lunch_backlog_separate() {
        let store = Arc::new(MemoryStore::new());
        let mut planner = MealPlanner::mount(store.clone());
        planner.add_to_backlog(MealKind::Lunch, "Chicken Salad").unwrap();
        assert!(planner.backlog(MealKind::Dinner).is_empty());
        assert_eq!(
            store.read(Subtree::LunchPrep.path()).unwrap(),
            Some(json!(["Chicken Salad"]))
        );
        assert!(planner.history(MealKind::Lunch).contains("chicken salad"));
        assert!(planner.history(MealKind::Dinner).is_empty());
        assert_eq!(
            planner.remove_from_backlog(MealKind::Lunch, 0).unwrap(),
            "Chicken Salad"
        );
    }

    #[test]
    fn test_add_to_backlog_rejects_blank() {
        let store = Arc::new(MemoryStore::new());
        let mut planner = MealPlanner::mount(store);
        assert!(matches!(
            planner.add_to_backlog(MealKind::Dinner, "   "),
            Err(PlanError::Form(FormError::MissingName))
        ));
    }

    #[test]
    fn test_history_dedup_through_planner() {
        let store = Arc::new(MemoryStore::new());
        let mut planner = MealPlanner::mount(store.clone());
        planner.add_to_backlog(MealKind::Dinner, "Tacos").unwrap();
        planner.add_to_backlog(MealKind::Dinner, "tacos").unwrap();
        assert_eq!(
            store.read(Subtree::MealHistory.path()).unwrap(),
            Some(json!({"Tacos": "Tacos"}))
        );
    }

    #[test]
    fn test_suggestions_exclude_backlog() {
        let store = Arc::new(MemoryStore::new());
        let mut planner = MealPlanner::mount(store);
        planner.add_to_backlog(MealKind::Dinner, "Fish Tacos").unwrap();
        planner.add_to_backlog(MealKind::Dinner, "Shrimp Tacos").unwrap();
        planner.remove_from_backlog(MealKind::Dinner, 1).unwrap();
        assert_eq!(planner.suggestions(MealKind::Dinner, "taco"), vec!["Shrimp Tacos"]);
    }

    #[test]
    fn test_save_and_select_recipe() {
        let store = Arc::new(MemoryStore::new());
        let mut planner = MealPlanner::mount(store.clone());
        let saved = planner
            .save_recipe(MealKind::Dinner, "chicken tikka", tikka())
            .unwrap();
        assert_eq!(saved.name, "Chicken Tikka");

        let stored = store.read(Subtree::Recipes.path()).unwrap().unwrap();
        assert_eq!(stored["Chicken Tikka"]["prepMinutes"], 20);
        assert_eq!(stored["Chicken Tikka"]["ingredients"][1]["item"], "yogurt");

        let prefill = planner.select_suggestion(MealKind::Dinner, "CHICKEN TIKKA");
        assert_eq!(prefill.protein, "Chicken");
        assert_eq!(prefill.ingredients.len(), 2);
        assert!(planner.select_suggestion(MealKind::Dinner, "nothing").ingredients.is_empty());
    }

    #[test]
    fn test_save_recipe_validates_qty_and_drops_blank_rows() {
        let store = Arc::new(MemoryStore::new());
        let mut planner = MealPlanner::mount(store);
        let mut r = tikka();
        r.ingredients.push(IngredientRow::default());
        let saved = planner.save_recipe(MealKind::Dinner, "Tikka", r).unwrap();
        assert_eq!(saved.ingredients.len(), 2);

        let mut bad = tikka();
        bad.ingredients[0].qty = "some".to_string();
        assert!(matches!(
            planner.save_recipe(MealKind::Dinner, "Tikka", bad),
            Err(PlanError::Form(FormError::InvalidQuantity(_)))
        ));
    }

    #[test]
    fn test_recipe_key_sanitized() {
        let store = Arc::new(MemoryStore::new());
        let mut planner = MealPlanner::mount(store.clone());
        planner
            .save_recipe(MealKind::Lunch, "p.b. & j", Recipe::default())
            .unwrap();
        let stored = store.read(Subtree::LunchRecipes.path()).unwrap().unwrap();
        assert_eq!(stored["P_b_ & J"]["name"], "P.b. & J");
        assert!(planner.recipe(MealKind::Lunch, "P.B. & J").is_some());
        planner.delete_recipe(MealKind::Lunch, "p.b. & j").unwrap();
        assert!(planner.recipes(MealKind::Lunch).is_empty());
    }

    #[test]
    fn test_add_ingredient_to_groceries() {
        let store = Arc::new(MemoryStore::new());
        let mut planner = MealPlanner::mount(store.clone());
        planner.save_recipe(MealKind::Dinner, "Tikka", tikka()).unwrap();

        let item = planner
            .add_ingredient_to_groceries(MealKind::Dinner, "tikka", 1, at(1_000))
            .unwrap();
        assert_eq!(item.name, "Yogurt");
        assert_eq!(item.qty, "1");
        assert_eq!(item.source_recipe.as_deref(), Some("Tikka"));

        let history = store.read(Subtree::GroceryHistory.path()).unwrap().unwrap();
        assert_eq!(history["Yogurt"]["unit"], "cups");
        assert!(matches!(
            planner.add_ingredient_to_groceries(MealKind::Dinner, "tikka", 9, at(2_000)),
            Err(PlanError::NoIngredient { index: 9, .. })
        ));
    }

    #[test]
    fn test_add_recipe_to_groceries_single_write() {
        let store = Arc::new(SpyStore::new());
        let mut planner = MealPlanner::mount(store.clone());
        planner.save_recipe(MealKind::Dinner, "Tikka", tikka()).unwrap();
        let before = store.written_paths().len();

        let added = planner
            .add_recipe_to_groceries(MealKind::Dinner, "Tikka", at(7))
            .unwrap();
        assert_eq!(added.len(), 2);
        let list_writes = store.written_paths()[before..]
            .iter()
            .filter(|p| *p == Subtree::GroceryList.path())
            .count();
        assert_eq!(list_writes, 1);
    }

    #[test]
    fn test_transfer_keeps_history_written_after_mount() {
        let store = Arc::new(MemoryStore::new());
        let mut planner = MealPlanner::mount(store.clone());
        planner.save_recipe(MealKind::Dinner, "Tikka", tikka()).unwrap();
        store
            .write(
                Subtree::GroceryHistory.path(),
                &json!({"Milk": {"name": "Milk", "unit": "gal", "store": "Costco"}}),
            )
            .unwrap();

        planner
            .add_recipe_to_groceries(MealKind::Dinner, "Tikka", at(3))
            .unwrap();
        let history = store
            .read(Subtree::GroceryHistory.path())
            .unwrap()
            .unwrap();
        assert_eq!(history["Milk"]["store"], "Costco");
        assert_eq!(history["Yogurt"]["unit"], "cups");
        assert!(planner.grocery_history().contains_key("Milk"));
    }

    #[test]
    fn test_transfer_refused_while_loading() {
        let store = Arc::new(MemoryStore::new());
        let mut planner = MealPlanner::new(store);
        planner.load(Subtree::Recipes);
        assert!(matches!(
            planner.add_recipe_to_groceries(MealKind::Dinner, "x", at(1)),
            Err(PlanError::NoRecipe { .. })
        ));
        planner.save_recipe(MealKind::Dinner, "Tikka", tikka()).unwrap();
        assert!(matches!(
            planner.add_recipe_to_groceries(MealKind::Dinner, "Tikka", at(1)),
            Err(PlanError::NotLoaded)
        ));
    }

    #[test]
    fn test_clear_meals() {
        let store = Arc::new(MemoryStore::new());
        let mut planner = MealPlanner::mount(store);
        planner.set_meal(DayName::Monday, "Soup");
        planner.set_meal(DayName::Friday, "Fish");
        planner.clear_meal(DayName::Monday);
        assert_eq!(planner.week().meal(DayName::Monday), "");
        assert_eq!(planner.week().planned_count(), 1);
        planner.clear_all_meals();
        assert_eq!(planner.week().planned_count(), 0);
    }
}
