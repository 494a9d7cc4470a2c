//! Compiled-in store list. Drives group ordering, suggestions and links.

use std::cmp::Ordering;

use serde::Serialize;

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Grocery,
    Retailer,
    Generic,
}

impl StoreKind {
    #[must_use]
    pub fn tier(self) -> u8 {
        match self {
            StoreKind::Grocery => 1,
            StoreKind::Retailer => 2,
            StoreKind::Generic => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreMeta {
    pub name: &'static str,
    pub url: Option<&'static str>,
    pub kind: StoreKind,
}

pub const STORES: &[StoreMeta] = &[
    StoreMeta {
        name: "Sam's Club",
        url: Some("https://www.samsclub.com"),
        kind: StoreKind::Grocery,
    },
    StoreMeta {
        name: "Costco",
        url: Some("https://www.costco.com"),
        kind: StoreKind::Grocery,
    },
    StoreMeta {
        name: "Kroger",
        url: Some("https://www.kroger.com"),
        kind: StoreKind::Grocery,
    },
    StoreMeta {
        name: "HEB",
        url: Some("https://www.heb.com"),
        kind: StoreKind::Grocery,
    },
    StoreMeta {
        name: "Walmart",
        url: Some("https://www.walmart.com"),
        kind: StoreKind::Grocery,
    },
    StoreMeta {
        name: "Walgreens",
        url: Some("https://www.walgreens.com"),
        kind: StoreKind::Retailer,
    },
    StoreMeta {
        name: "Amazon",
        url: Some("https://www.amazon.com"),
        kind: StoreKind::Retailer,
    },
    StoreMeta {
        name: "Grocery",
        url: None,
        kind: StoreKind::Generic,
    },
    StoreMeta {
        name: "Pharmacy",
        url: None,
        kind: StoreKind::Generic,
    },
    StoreMeta {
        name: UNCATEGORIZED,
        url: None,
        kind: StoreKind::Generic,
    },
];

/// Case-insensitive lookup by name.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static StoreMeta> {
    let name = name.trim();
    STORES.iter().find(|s| s.name.eq_ignore_ascii_case(name))
}

/// The name a store is grouped under: the listed spelling for known stores,
/// the trimmed input otherwise, and "Uncategorized" when blank.
#[must_use]
pub fn canonical_name(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return UNCATEGORIZED.to_string();
    }
    lookup(name).map_or_else(|| name.to_string(), |s| s.name.to_string())
}

/// Stores not in the list are treated as generic.
#[must_use]
pub fn kind_of(name: &str) -> StoreKind {
    lookup(name).map_or(StoreKind::Generic, |s| s.kind)
}

/// Group order: "Uncategorized" last, then by tier, then by name ignoring
/// case, with an exact comparison to break ties.
#[must_use]
pub fn compare_stores(a: &str, b: &str) -> Ordering {
    match (
        a.trim().eq_ignore_ascii_case(UNCATEGORIZED),
        b.trim().eq_ignore_ascii_case(UNCATEGORIZED),
    ) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    kind_of(a)
        .tier()
        .cmp(&kind_of(b).tier())
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| a.cmp(b))
}

/// Known store names containing `query` (case-insensitive), in group order.
/// An empty query returns every store.
#[must_use]
pub fn store_suggestions(query: &str) -> Vec<&'static str> {
    let q = query.trim().to_lowercase();
    let mut names: Vec<&'static str> = STORES
        .iter()
        .map(|s| s.name)
        .filter(|n| q.is_empty() || n.to_lowercase().contains(&q))
        .collect();
    names.sort_by(|a, b| compare_stores(a, b));
    names
}

/// Lowercase ASCII alphanumerics only: "Sam's Club" -> "samsclub".
#[must_use]
pub fn icon_slug(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut names: Vec<&str>) -> Vec<&str> {
        names.sort_by(|a, b| compare_stores(a, b));
        names
    }

    #[test]
    fn test_group_order_any_input_order() {
        let expected = vec!["Costco", "Walgreens", "Uncategorized"];
        assert_eq!(
            sorted(vec!["Uncategorized", "Costco", "Walgreens"]),
            expected
        );
        assert_eq!(
            sorted(vec!["Walgreens", "Uncategorized", "Costco"]),
            expected
        );
        assert_eq!(
            sorted(vec!["Costco", "Walgreens", "Uncategorized"]),
            expected
        );
    }

    #[test]
    fn test_unknown_store_is_generic_before_uncategorized() {
        assert_eq!(
            sorted(vec!["Uncategorized", "Farmers Market", "Amazon", "HEB"]),
            vec!["HEB", "Amazon", "Farmers Market", "Uncategorized"]
        );
    }

    #[test]
    fn test_name_ties_are_case_insensitive_then_exact() {
        assert_eq!(
            sorted(vec!["corner shop", "Bakery", "Corner Shop"]),
            vec!["Bakery", "Corner Shop", "corner shop"]
        );
    }

    #[test]
    fn test_lookup_and_kind() {
        assert_eq!(lookup("costco").map(|s| s.name), Some("Costco"));
        assert_eq!(kind_of("Amazon"), StoreKind::Retailer);
        assert_eq!(kind_of("Nowhere"), StoreKind::Generic);
        assert!(lookup("Pharmacy").unwrap().url.is_none());
    }

    #[test]
    fn test_store_suggestions() {
        assert_eq!(store_suggestions("club"), vec!["Sam's Club"]);
        assert_eq!(store_suggestions("AR"), vec!["Walmart", "Pharmacy"]);
        let all = store_suggestions("");
        assert_eq!(all.len(), STORES.len());
        assert_eq!(all.last(), Some(&UNCATEGORIZED));
        assert_eq!(all[0], "Costco");
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name(" costco "), "Costco");
        assert_eq!(canonical_name("uncategorized"), UNCATEGORIZED);
        assert_eq!(canonical_name(""), UNCATEGORIZED);
        assert_eq!(canonical_name(" Corner Market "), "Corner Market");
        assert_eq!(
            compare_stores("uncategorized", "Corner Market"),
            Ordering::Greater
        );
    }

    #[test]
    fn test_icon_slug() {
        assert_eq!(icon_slug("Sam's Club"), "samsclub");
        assert_eq!(icon_slug("HEB"), "heb");
    }
}
