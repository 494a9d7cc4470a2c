use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local};
use serde_json::Value;

use crate::grocery::GroceryList;
use crate::models::GroceryItem;
use crate::planner::{MealKind, MealPlanner, PlanError};
use crate::store::{self, DocumentStore};

/// Both views mounted over one store.
///
/// Ingredient transfer writes the grocery list and grocery history behind
/// the grocery view's back, so the wrappers here refresh it afterwards.
pub struct Dashboard<S: DocumentStore> {
    store: Arc<S>,
    planner: MealPlanner<S>,
    groceries: GroceryList<S>,
}

impl<S: DocumentStore> Dashboard<S> {
    pub fn mount(store: Arc<S>) -> Self {
        Self {
            planner: MealPlanner::mount(Arc::clone(&store)),
            groceries: GroceryList::mount(Arc::clone(&store)),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn planner(&self) -> &MealPlanner<S> {
        &self.planner
    }

    pub fn planner_mut(&mut self) -> &mut MealPlanner<S> {
        &mut self.planner
    }

    /// The grocery view, caught up with any change made through the store.
    pub fn groceries(&mut self) -> &mut GroceryList<S> {
        self.groceries.refresh();
        &mut self.groceries
    }

    pub fn add_ingredient_to_groceries(
        &mut self,
        kind: MealKind,
        recipe: &str,
        row: usize,
        now: DateTime<Local>,
    ) -> Result<GroceryItem, PlanError> {
        let item = self
            .planner
            .add_ingredient_to_groceries(kind, recipe, row, now)?;
        self.groceries.refresh();
        self.groceries.reload_history();
        Ok(item)
    }

    pub fn add_recipe_to_groceries(
        &mut self,
        kind: MealKind,
        recipe: &str,
        now: DateTime<Local>,
    ) -> Result<Vec<GroceryItem>, PlanError> {
        let items = self.planner.add_recipe_to_groceries(kind, recipe, now)?;
        self.groceries.refresh();
        self.groceries.reload_history();
        Ok(items)
    }

    pub fn export_tree(&self) -> Result<BTreeMap<String, Value>> {
        store::export_tree(self.store.as_ref())
    }

    /// Write every entry of `tree`, then remount both views so their mirrors
    /// match what was imported.
    pub fn import_tree(&mut self, tree: &BTreeMap<String, Value>) -> Result<usize> {
        let written = store::import_tree(self.store.as_ref(), tree)?;
        *self = Self::mount(Arc::clone(&self.store));
        Ok(written)
    }
}
