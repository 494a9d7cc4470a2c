use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::warn;

use crate::history::sort_case_insensitive;
use crate::models::{
    FormError, GroceryDefaults, GroceryEdit, GroceryItem, IngredientRow, NewGroceryItem,
    added_date_label, sanitize_key, title_case, validate_name, validate_product_url,
    validate_quantity,
};
use crate::shops::{self, StoreKind, UNCATEGORIZED};
use crate::store::{DocumentStore, Subscription};
use crate::sync::{Subtree, SyncController, decode_map, decode_sequence};

pub const UNIT_SUGGESTIONS: [&str; 5] = ["lbs", "pkg", "cups", "gallons", "oz"];

/// Sanitized item name -> last-used defaults.
pub type GroceryHistory = BTreeMap<String, GroceryDefaults>;

/// Preset units starting with `query`, ignoring case. Empty query returns all.
#[must_use]
pub fn unit_suggestions(query: &str) -> Vec<&'static str> {
    let q = query.trim().to_lowercase();
    UNIT_SUGGESTIONS
        .iter()
        .copied()
        .filter(|u| u.starts_with(&q))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreGroup {
    pub store: String,
    pub url: Option<&'static str>,
    pub kind: StoreKind,
    pub icon: String,
    pub remaining: usize,
    pub checked: usize,
    pub items: Vec<GroceryItem>,
}

/// Groups items by store, in display order. Items keep list order inside
/// each group. Known stores group under their listed spelling whatever the
/// case; a blank store counts as "Uncategorized".
#[must_use]
pub fn group_by_store(items: &[GroceryItem]) -> Vec<StoreGroup> {
    let mut by_store: BTreeMap<String, Vec<GroceryItem>> = BTreeMap::new();
    for item in items {
        by_store
            .entry(shops::canonical_name(&item.store))
            .or_default()
            .push(item.clone());
    }

    let mut groups: Vec<StoreGroup> = by_store
        .into_iter()
        .map(|(store, items)| {
            let meta = shops::lookup(&store);
            let checked = items.iter().filter(|i| i.checked).count();
            StoreGroup {
                url: meta.and_then(|m| m.url),
                kind: meta.map_or(StoreKind::Generic, |m| m.kind),
                icon: shops::icon_slug(&store),
                remaining: items.len() - checked,
                checked,
                store,
                items,
            }
        })
        .collect();
    groups.sort_by(|a, b| shops::compare_stores(&a.store, &b.store));
    groups
}

/// Form values offered when a remembered item is picked. Quantity is always blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroceryPrefill {
    pub name: String,
    pub qty: String,
    pub unit: String,
    pub store: String,
    pub product_url: String,
    pub notes: String,
}

/// Millisecond timestamp id, bumped until no item in `existing` has it.
#[must_use]
pub fn next_id(existing: &[GroceryItem], now_ms: i64) -> String {
    let taken: BTreeSet<&str> = existing.iter().map(|i| i.id.as_str()).collect();
    let mut candidate = now_ms;
    while taken.contains(candidate.to_string().as_str()) {
        candidate += 1;
    }
    candidate.to_string()
}

/// The stored key and defaults remembered for `name`, matched exactly first
/// and then ignoring case.
fn history_entry<'a>(
    history: &'a GroceryHistory,
    name: &str,
) -> Option<(&'a str, &'a GroceryDefaults)> {
    if let Some((key, d)) = history.get_key_value(&sanitize_key(name)) {
        return Some((key.as_str(), d));
    }
    let lower = name.trim().to_lowercase();
    history
        .iter()
        .find(|(key, d)| display_name(key, d).to_lowercase() == lower)
        .map(|(key, d)| (key.as_str(), d))
}

fn display_name<'a>(key: &'a str, defaults: &'a GroceryDefaults) -> &'a str {
    if defaults.name.is_empty() {
        key
    } else {
        &defaults.name
    }
}

/// Turn recipe rows into grocery items appended to the stored list.
///
/// Reads the list fresh from the store right before writing it back, so
/// edits made elsewhere since this process last looked are kept. Nothing
/// prevents a concurrent writer from racing in between. `history` is updated
/// in place; the caller is responsible for persisting it.
pub fn transfer_ingredients<S: DocumentStore + ?Sized>(
    store: &S,
    rows: &[IngredientRow],
    recipe_name: &str,
    history: &mut GroceryHistory,
    now: DateTime<Local>,
) -> Result<Vec<GroceryItem>> {
    let path = Subtree::GroceryList.path();
    let mut list: Vec<GroceryItem> = match store.read(path)? {
        Some(v) => decode_sequence(&v, "grocery list"),
        None => Vec::new(),
    };

    let mut added = Vec::new();
    for row in rows.iter().filter(|r| !r.item.trim().is_empty()) {
        let name = title_case(&row.item);
        let unit = row.unit.trim().to_string();
        let found = history_entry(history, &name).map(|(key, d)| (key.to_string(), d.clone()));
        let defaults = found.as_ref().map(|(_, d)| d.clone()).unwrap_or_default();
        let store_name = if defaults.store.trim().is_empty() {
            UNCATEGORIZED.to_string()
        } else {
            defaults.store.clone()
        };

        let item = GroceryItem {
            id: next_id(&list, now.timestamp_millis()),
            name: name.clone(),
            qty: validate_quantity(&row.qty).unwrap_or_default(),
            unit: unit.clone(),
            store: store_name.clone(),
            checked: false,
            added_date: added_date_label(now.date_naive()),
            product_url: defaults.product_url.clone(),
            notes: defaults.notes.clone(),
            source_recipe: Some(recipe_name.to_string()),
        };
        list.push(item.clone());
        added.push(item);

        let existing = match found {
            Some((key, _)) => history.get_mut(&key),
            None => None,
        };
        match existing {
            Some(existing) => {
                if existing.unit.is_empty() {
                    existing.unit = unit;
                }
            }
            None => {
                history.insert(
                    sanitize_key(&name),
                    GroceryDefaults {
                        name,
                        unit,
                        store: store_name,
                        ..GroceryDefaults::default()
                    },
                );
            }
        }
    }

    if added.is_empty() {
        return Ok(added);
    }
    let encoded = serde_json::to_value(&list)?;
    if let Err(e) = store.write(path, &encoded) {
        warn!(path, error = %e, "write failed");
    }
    Ok(added)
}

/// The grocery list view: live list plus remembered item defaults.
pub struct GroceryList<S: DocumentStore> {
    sync: SyncController<S>,
    items: Vec<GroceryItem>,
    history: GroceryHistory,
    feed: Option<Subscription>,
}

impl<S: DocumentStore> GroceryList<S> {
    pub const TRACKED: [Subtree; 2] = [Subtree::GroceryList, Subtree::GroceryHistory];

    /// A view with nothing loaded yet. Writes stay deferred until both
    /// subtrees are loaded.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            sync: SyncController::new(store, &Self::TRACKED),
            items: Vec::new(),
            history: GroceryHistory::new(),
            feed: None,
        }
    }

    pub fn mount(store: Arc<S>) -> Self {
        let mut view = Self::new(store);
        for subtree in Self::TRACKED {
            view.load(subtree);
        }
        view
    }

    /// Initial read of one tracked subtree. The list is subscribed so later
    /// changes arrive through `refresh`; history is read once.
    pub fn load(&mut self, subtree: Subtree) {
        match subtree {
            Subtree::GroceryList => {
                let (feed, value) = self.sync.subscribe_initial(subtree);
                self.feed = feed;
                if let Some(v) = value {
                    self.items = decode_sequence(&v, "grocery list");
                }
            }
            Subtree::GroceryHistory => {
                if let Some(v) = self.sync.read_initial(subtree) {
                    self.history = decode_map(&v, "grocery history");
                }
            }
            other => warn!(path = other.path(), "not tracked by the grocery list"),
        }
        for dirty in self.sync.take_flush() {
            self.persist(dirty);
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.sync.all_loaded()
    }

    /// Apply the newest delivery from the list subscription, if any.
    pub fn refresh(&mut self) {
        let Some(feed) = &self.feed else { return };
        if let Some(latest) = feed.latest() {
            self.items = latest
                .map(|v| decode_sequence(&v, "grocery list"))
                .unwrap_or_default();
        }
    }

    /// Re-read remembered defaults written by another view. A failed read
    /// keeps the current copy.
    pub fn reload_history(&mut self) {
        if !self.sync.all_loaded() {
            return;
        }
        match self.sync.read_latest(Subtree::GroceryHistory) {
            Ok(Some(v)) => self.history = decode_map(&v, "grocery history"),
            Ok(None) => self.history.clear(),
            Err(e) => warn!(error = %e, "grocery history reload failed"),
        }
    }

    pub fn items(&self) -> &[GroceryItem] {
        &self.items
    }

    pub fn history(&self) -> &GroceryHistory {
        &self.history
    }

    pub fn item(&self, id: &str) -> Option<&GroceryItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn checked_count(&self) -> usize {
        self.items.iter().filter(|i| i.checked).count()
    }

    pub fn groups(&self) -> Vec<StoreGroup> {
        group_by_store(&self.items)
    }

    fn persist(&mut self, subtree: Subtree) {
        match subtree {
            Subtree::GroceryList => {
                self.sync.write_serialized(subtree, &self.items);
            }
            Subtree::GroceryHistory => {
                self.sync.write_serialized(subtree, &self.history);
            }
            _ => {}
        }
    }

    /// Overwrite the remembered defaults for the item, reusing an entry that
    /// differs from it only by case.
    fn remember(&mut self, item: &GroceryItem) {
        let key = history_entry(&self.history, &item.name)
            .map_or_else(|| sanitize_key(&item.name), |(key, _)| key.to_string());
        self.history.insert(
            key,
            GroceryDefaults {
                name: item.name.clone(),
                unit: item.unit.clone(),
                store: item.store.clone(),
                product_url: item.product_url.clone(),
                notes: item.notes.clone(),
            },
        );
    }

    pub fn add_item(
        &mut self,
        form: &NewGroceryItem,
        now: DateTime<Local>,
    ) -> Result<GroceryItem, FormError> {
        let name = validate_name(&form.name)?;
        let qty = validate_quantity(&form.qty)?;
        let product_url = validate_product_url(&form.product_url)?;
        let store = match form.store.trim() {
            "" => UNCATEGORIZED.to_string(),
            s => s.to_string(),
        };

        self.refresh();
        let item = GroceryItem {
            id: next_id(&self.items, now.timestamp_millis()),
            name,
            qty,
            unit: form.unit.trim().to_string(),
            store,
            checked: false,
            added_date: added_date_label(now.date_naive()),
            product_url,
            notes: form.notes.trim().to_string(),
            source_recipe: None,
        };
        self.items.push(item.clone());
        self.remember(&item);
        self.persist(Subtree::GroceryList);
        self.persist(Subtree::GroceryHistory);
        Ok(item)
    }

    /// Flip `checked`; returns the new state, or `None` for an unknown id.
    pub fn toggle_checked(&mut self, id: &str) -> Option<bool> {
        self.refresh();
        let item = self.items.iter_mut().find(|i| i.id == id)?;
        item.checked = !item.checked;
        let state = item.checked;
        self.persist(Subtree::GroceryList);
        Some(state)
    }

    pub fn remove_item(&mut self, id: &str) -> Option<GroceryItem> {
        self.refresh();
        let pos = self.items.iter().position(|i| i.id == id)?;
        let removed = self.items.remove(pos);
        self.persist(Subtree::GroceryList);
        Some(removed)
    }

    /// Drops every checked item; returns how many went.
    pub fn clear_checked(&mut self) -> usize {
        self.refresh();
        let before = self.items.len();
        self.items.retain(|i| !i.checked);
        let removed = before - self.items.len();
        if removed > 0 {
            self.persist(Subtree::GroceryList);
        }
        removed
    }

    /// Apply the provided fields. `Ok(None)` means no item has that id.
    pub fn edit_item(
        &mut self,
        id: &str,
        edit: &GroceryEdit,
    ) -> Result<Option<GroceryItem>, FormError> {
        let name = edit.name.as_deref().map(validate_name).transpose()?;
        let qty = edit.qty.as_deref().map(validate_quantity).transpose()?;
        let product_url = edit
            .product_url
            .as_deref()
            .map(validate_product_url)
            .transpose()?;

        self.refresh();
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        if let Some(name) = name {
            item.name = name;
        }
        if let Some(qty) = qty {
            item.qty = qty;
        }
        if let Some(unit) = &edit.unit {
            item.unit = unit.trim().to_string();
        }
        if let Some(store) = &edit.store {
            item.store = match store.trim() {
                "" => UNCATEGORIZED.to_string(),
                s => s.to_string(),
            };
        }
        if let Some(url) = product_url {
            item.product_url = url;
        }
        if let Some(notes) = &edit.notes {
            item.notes = notes.trim().to_string();
        }
        let updated = item.clone();
        self.remember(&updated);
        self.persist(Subtree::GroceryList);
        self.persist(Subtree::GroceryHistory);
        Ok(Some(updated))
    }

    /// Remembered names matching `query`, minus anything still unchecked on
    /// the list. An empty query lists every candidate.
    pub fn item_suggestions(&self, query: &str) -> Vec<String> {
        let q = query.trim().to_lowercase();
        let active: BTreeSet<String> = self
            .items
            .iter()
            .filter(|i| !i.checked)
            .map(|i| i.name.to_lowercase())
            .collect();
        let mut names: Vec<String> = self
            .history
            .iter()
            .map(|(key, d)| display_name(key, d).to_string())
            .filter(|name| {
                let lower = name.to_lowercase();
                !active.contains(&lower) && (q.is_empty() || lower.contains(&q))
            })
            .collect();
        sort_case_insensitive(&mut names);
        names.dedup();
        names
    }

    pub fn select_suggestion(&self, name: &str) -> GroceryPrefill {
        let found = history_entry(&self.history, name);
        let display = found.map_or_else(
            || name.trim().to_string(),
            |(key, d)| display_name(key, d).to_string(),
        );
        let defaults = found.map(|(_, d)| d.clone()).unwrap_or_default();
        GroceryPrefill {
            name: display,
            qty: String::new(),
            unit: defaults.unit,
            store: defaults.store,
            product_url: defaults.product_url,
            notes: defaults.notes,
        }
    }
}
