use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::{sanitize_key, title_case};

/// Previously used meal names, for autocomplete. Keys are store-safe,
/// values keep the title-cased display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryDictionary {
    entries: BTreeMap<String, String>,
}

impl From<BTreeMap<String, String>> for HistoryDictionary {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }
}

impl HistoryDictionary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive membership.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let needle = name.trim().to_lowercase();
        self.entries.values().any(|v| v.to_lowercase() == needle)
    }

    /// Adds the title-cased name unless a case-insensitive match exists.
    /// Returns true if the dictionary changed.
    pub fn insert(&mut self, name: &str) -> bool {
        let display = title_case(name);
        if display.is_empty() || self.contains(&display) {
            return false;
        }
        self.entries.insert(sanitize_key(&display), display);
        true
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    /// Names containing `query` (case-insensitive), minus anything in
    /// `exclude` (compared case-insensitively), sorted case-insensitively.
    /// An empty query matches nothing.
    #[must_use]
    pub fn suggest(&self, query: &str, exclude: &[String]) -> Vec<String> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Vec::new();
        }
        let excluded: BTreeSet<String> = exclude.iter().map(|e| e.trim().to_lowercase()).collect();
        let mut out: Vec<String> = self
            .entries
            .values()
            .filter(|name| {
                let lower = name.to_lowercase();
                lower.contains(&q) && !excluded.contains(&lower)
            })
            .cloned()
            .collect();
        sort_case_insensitive(&mut out);
        out
    }
}

pub fn sort_case_insensitive(names: &mut [String]) {
    names.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
}
