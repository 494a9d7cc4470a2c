//! Load gate and write-back for views that mirror store subtrees.
//!
//! A view reads each tracked subtree once on mount. Until every one of those
//! reads has completed, nothing the view does may reach the store: a cold
//! mount would otherwise overwrite real data with empty defaults.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::store::{DocumentStore, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Subtree {
    CurrentWeek,
    Ideas,
    LunchPrep,
    MealHistory,
    LunchHistory,
    Recipes,
    LunchRecipes,
    GroceryList,
    GroceryHistory,
}

impl Subtree {
    pub const ALL: [Subtree; 9] = [
        Subtree::CurrentWeek,
        Subtree::Ideas,
        Subtree::LunchPrep,
        Subtree::MealHistory,
        Subtree::LunchHistory,
        Subtree::Recipes,
        Subtree::LunchRecipes,
        Subtree::GroceryList,
        Subtree::GroceryHistory,
    ];

    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Subtree::CurrentWeek => "mealPlanner/currentWeek",
            Subtree::Ideas => "mealPlanner/ideas",
            Subtree::LunchPrep => "mealPlanner/lunchPrep",
            Subtree::MealHistory => "mealPlanner/mealHistory",
            Subtree::LunchHistory => "mealPlanner/lunchHistory",
            Subtree::Recipes => "mealPlanner/recipes",
            Subtree::LunchRecipes => "mealPlanner/lunchRecipes",
            Subtree::GroceryList => "mealPlanner/groceryList",
            Subtree::GroceryHistory => "mealPlanner/groceryHistory",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadGate {
    tracked: Vec<Subtree>,
    loaded: BTreeSet<Subtree>,
    dirty: BTreeSet<Subtree>,
}

impl LoadGate {
    #[must_use]
    pub fn new(tracked: &[Subtree]) -> Self {
        Self {
            tracked: tracked.to_vec(),
            loaded: BTreeSet::new(),
            dirty: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn tracked(&self) -> &[Subtree] {
        &self.tracked
    }

    #[must_use]
    pub fn is_loaded(&self, subtree: Subtree) -> bool {
        self.loaded.contains(&subtree)
    }

    #[must_use]
    pub fn all_loaded(&self) -> bool {
        self.tracked.iter().all(|s| self.loaded.contains(s))
    }

    /// Tracked subtrees whose initial read has not completed yet.
    #[must_use]
    pub fn pending(&self) -> Vec<Subtree> {
        self.tracked
            .iter()
            .copied()
            .filter(|s| !self.loaded.contains(s))
            .collect()
    }

    pub fn mark_loaded(&mut self, subtree: Subtree) {
        self.loaded.insert(subtree);
    }

    pub fn mark_dirty(&mut self, subtree: Subtree) {
        self.dirty.insert(subtree);
    }

    pub fn clear_dirty(&mut self, subtree: Subtree) {
        self.dirty.remove(&subtree);
    }

    #[must_use]
    pub fn is_dirty(&self, subtree: Subtree) -> bool {
        self.dirty.contains(&subtree)
    }

    /// Once the gate is open, hands back (and forgets) every subtree changed
    /// while it was closed. Returns nothing while any read is outstanding.
    pub fn take_flush(&mut self) -> Vec<Subtree> {
        if !self.all_loaded() {
            return Vec::new();
        }
        std::mem::take(&mut self.dirty).into_iter().collect()
    }
}

pub struct SyncController<S: DocumentStore> {
    store: Arc<S>,
    gate: LoadGate,
}

impl<S: DocumentStore> SyncController<S> {
    pub fn new(store: Arc<S>, tracked: &[Subtree]) -> Self {
        Self {
            store,
            gate: LoadGate::new(tracked),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn gate(&self) -> &LoadGate {
        &self.gate
    }

    pub fn all_loaded(&self) -> bool {
        self.gate.all_loaded()
    }

    /// Initial read of `subtree`. Marks it loaded whatever the outcome; a
    /// failed read counts as "no data". Returned data supersedes any local
    /// edits made before the read finished.
    pub fn read_initial(&mut self, subtree: Subtree) -> Option<Value> {
        let value = match self.store.read(subtree.path()) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = subtree.path(), error = %e, "initial read failed, keeping defaults");
                None
            }
        };
        self.settle(subtree, value.is_some());
        value
    }

    /// Like `read_initial`, but keeps the live feed so later changes to the
    /// subtree can be picked up. The feed's first delivery is the initial read.
    pub fn subscribe_initial(&mut self, subtree: Subtree) -> (Option<Subscription>, Option<Value>) {
        let (feed, value) = match self.store.subscribe(subtree.path()) {
            Ok(sub) => {
                let value = sub.latest().flatten();
                (Some(sub), value)
            }
            Err(e) => {
                warn!(path = subtree.path(), error = %e, "subscribe failed, keeping defaults");
                (None, None)
            }
        };
        self.settle(subtree, value.is_some());
        (feed, value)
    }

    fn settle(&mut self, subtree: Subtree, has_data: bool) {
        self.gate.mark_loaded(subtree);
        if has_data {
            self.gate.clear_dirty(subtree);
        }
    }

    /// Write `value` back unless the gate is still closed, in which case the
    /// subtree is remembered for the flush. Returns whether a write was issued.
    pub fn write(&mut self, subtree: Subtree, value: &Value) -> bool {
        if !self.gate.all_loaded() {
            debug!(path = subtree.path(), "gate closed, deferring write");
            self.gate.mark_dirty(subtree);
            return false;
        }
        if let Err(e) = self.store.write(subtree.path(), value) {
            warn!(path = subtree.path(), error = %e, "write failed");
        }
        true
    }

    pub fn write_serialized<T: Serialize>(&mut self, subtree: Subtree, value: &T) -> bool {
        match serde_json::to_value(value) {
            Ok(v) => self.write(subtree, &v),
            Err(e) => {
                warn!(path = subtree.path(), error = %e, "could not encode value");
                false
            }
        }
    }

    pub fn take_flush(&mut self) -> Vec<Subtree> {
        self.gate.take_flush()
    }

    /// Fresh read for read-modify-write sequences; errors propagate.
    pub fn read_latest(&self, subtree: Subtree) -> Result<Option<Value>> {
        self.store.read(subtree.path())
    }
}

/// Decode a stored sequence. Accepts an array, or an object whose values are
/// the elements (sparse arrays come back that way); numeric keys keep index
/// order. Nulls and undecodable elements are skipped.
pub fn decode_sequence<T: DeserializeOwned>(value: &Value, what: &str) -> Vec<T> {
    let elements: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| match (a.parse::<u64>(), b.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                (Err(_), Err(_)) => a.cmp(b),
            });
            entries.into_iter().map(|(_, v)| v).collect()
        }
        Value::Null => Vec::new(),
        other => {
            warn!(what, kind = json_kind(other), "expected a sequence, ignoring value");
            Vec::new()
        }
    };

    elements
        .into_iter()
        .filter(|v| !v.is_null())
        .filter_map(|v| match serde_json::from_value(v.clone()) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(what, error = %e, "skipping undecodable element");
                None
            }
        })
        .collect()
}

/// Decode a stored keyed map, skipping entries that do not decode.
pub fn decode_map<T: DeserializeOwned>(value: &Value, what: &str) -> BTreeMap<String, T> {
    let Value::Object(map) = value else {
        if !value.is_null() {
            warn!(what, kind = json_kind(value), "expected an object, ignoring value");
        }
        return BTreeMap::new();
    };
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .filter_map(|(k, v)| match serde_json::from_value(v.clone()) {
            Ok(item) => Some((k.clone(), item)),
            Err(e) => {
                warn!(what, key = %k, error = %e, "skipping undecodable entry");
                None
            }
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::testing::SpyStore;

    #[test]
    fn test_subtree_paths_unique() {
        let paths: BTreeSet<&str> = Subtree::ALL.iter().map(|s| s.path()).collect();
        assert_eq!(paths.len(), Subtree::ALL.len());
        assert!(paths.iter().all(|p| p.starts_with("mealPlanner/")));
    }

    #[test]
    fn test_gate_opens_after_all_reads() {
        let mut gate = LoadGate::new(&[Subtree::Ideas, Subtree::MealHistory]);
        assert!(!gate.all_loaded());
        gate.mark_loaded(Subtree::Ideas);
        assert!(!gate.all_loaded());
        assert_eq!(gate.pending(), vec![Subtree::MealHistory]);
        gate.mark_loaded(Subtree::MealHistory);
        assert!(gate.all_loaded());
    }

    #[test]
    fn test_writes_suppressed_until_loaded() {
        let store = Arc::new(SpyStore::new());
        let mut sync = SyncController::new(store.clone(), &[Subtree::Ideas, Subtree::LunchPrep]);

        assert!(!sync.write(Subtree::Ideas, &json!(["Tacos"])));
        sync.read_initial(Subtree::Ideas);
        assert!(!sync.write(Subtree::Ideas, &json!(["Tacos"])));
        assert_eq!(store.write_count(), 0);

        sync.read_initial(Subtree::LunchPrep);
        assert!(sync.write(Subtree::Ideas, &json!(["Tacos"])));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_failed_read_marks_loaded() {
        let store = Arc::new(SpyStore::new());
        store.seed(Subtree::Ideas.path(), json!(["Real"]));
        store.set_fail_reads(true);
        let mut sync = SyncController::new(store.clone(), &[Subtree::Ideas]);
        assert!(sync.read_initial(Subtree::Ideas).is_none());
        assert!(sync.all_loaded());
    }

    #[test]
    fn test_remote_data_clears_dirty() {
        let store = Arc::new(SpyStore::new());
        store.seed(Subtree::Ideas.path(), json!(["Remote"]));
        let mut sync = SyncController::new(store.clone(), &[Subtree::Ideas, Subtree::LunchPrep]);

        sync.write(Subtree::Ideas, &json!(["Local"]));
        sync.write(Subtree::LunchPrep, &json!(["Local lunch"]));
        assert!(sync.gate().is_dirty(Subtree::Ideas));

        assert_eq!(sync.read_initial(Subtree::Ideas), Some(json!(["Remote"])));
        assert!(!sync.gate().is_dirty(Subtree::Ideas));
        assert!(sync.take_flush().is_empty());

        assert!(sync.read_initial(Subtree::LunchPrep).is_none());
        assert_eq!(sync.take_flush(), vec![Subtree::LunchPrep]);
        assert!(sync.take_flush().is_empty());
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let store = Arc::new(SpyStore::new());
        store.set_fail_writes(true);
        let mut sync = SyncController::new(store.clone(), &[]);
        assert!(sync.write(Subtree::Ideas, &json!(["x"])));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_decode_sequence_array_skips_nulls() {
        let v = json!(["a", null, "b"]);
        let items: Vec<String> = decode_sequence(&v, "ideas");
        assert_eq!(items, vec!["a", "b"]);
    }

    #[test]
    fn test_decode_sequence_object_numeric_order() {
        let v = json!({"10": "k", "2": "c", "0": "a"});
        let items: Vec<String> = decode_sequence(&v, "ideas");
        assert_eq!(items, vec!["a", "c", "k"]);
    }

    #[test]
    fn test_decode_sequence_skips_bad_elements() {
        let v = json!(["ok", 5, "fine"]);
        let items: Vec<String> = decode_sequence(&v, "ideas");
        assert_eq!(items, vec!["ok", "fine"]);
        let scalar: Vec<String> = decode_sequence(&json!("nope"), "ideas");
        assert!(scalar.is_empty());
    }

    #[test]
    fn test_decode_map() {
        let v = json!({"Tacos": "Tacos", "Bad": 3, "Gone": null});
        let map: BTreeMap<String, String> = decode_map(&v, "history");
        assert_eq!(map.len(), 1);
        assert_eq!(map["Tacos"], "Tacos");
    }
}
