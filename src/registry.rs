//! Asset Registry - Indexed In-Memory Catalogs
//!
//! Shared by templates and themes. Every mutation keeps the category index
//! in step with the primary map, and an empty category bucket is removed
//! rather than left behind.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Modern,
    Classic,
    Minimal,
    Bold,
    Elegant,
    Playful,
    Corporate,
    Creative,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Modern,
        Category::Classic,
        Category::Minimal,
        Category::Bold,
        Category::Elegant,
        Category::Playful,
        Category::Corporate,
        Category::Creative,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Modern => "modern",
            Category::Classic => "classic",
            Category::Minimal => "minimal",
            Category::Bold => "bold",
            Category::Elegant => "elegant",
            Category::Playful => "playful",
            Category::Corporate => "corporate",
            Category::Creative => "creative",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Template,
    Theme,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Template => f.write_str("Template"),
            AssetKind::Theme => f.write_str("Theme"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: AssetKind, id: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AssetError {
    pub fn not_found(kind: AssetKind, id: &str) -> Self {
        AssetError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Descriptor fields every registry needs to index and search an asset.
pub trait Asset: Clone {
    const KIND: AssetKind;

    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn category(&self) -> Category;
    fn tags(&self) -> &[String];
}

/// Registry keyed by asset id, iterated in first-registration order.
#[derive(Debug, Clone)]
pub struct AssetRegistry<A: Asset> {
    assets: HashMap<String, A>,
    order: Vec<String>,
    by_category: BTreeMap<Category, Vec<String>>,
}

impl<A: Asset> AssetRegistry<A> {
    pub fn new() -> Self {
        Self {
            assets: HashMap::new(),
            order: Vec::new(),
            by_category: BTreeMap::new(),
        }
    }

    /// Register or replace an asset. Returns the replaced value, if any.
    ///
    /// A replaced asset keeps its iteration position; its category entry
    /// moves if the category changed.
    pub fn register(&mut self, asset: A) -> Option<A> {
        let id = asset.id().to_string();
        let category = asset.category();
        let previous = self.assets.insert(id.clone(), asset);

        match &previous {
            Some(old) if old.category() == category => {}
            Some(old) => {
                self.remove_from_index(old.category(), &id);
                self.by_category.entry(category).or_default().push(id.clone());
            }
            None => {
                self.order.push(id.clone());
                self.by_category.entry(category).or_default().push(id.clone());
            }
        }

        debug!(kind = %A::KIND, id = %id, category = %category, replaced = previous.is_some(), "Registered asset");
        previous
    }

    /// Register each asset in input order; later duplicates win.
    pub fn register_many<I: IntoIterator<Item = A>>(&mut self, assets: I) {
        for asset in assets {
            self.register(asset);
        }
    }

    pub fn unregister(&mut self, id: &str) -> bool {
        let Some(old) = self.assets.remove(id) else {
            return false;
        };
        self.order.retain(|existing| existing != id);
        self.remove_from_index(old.category(), id);
        debug!(kind = %A::KIND, id = %id, "Unregistered asset");
        true
    }

    fn remove_from_index(&mut self, category: Category, id: &str) {
        if let Some(bucket) = self.by_category.get_mut(&category) {
            bucket.retain(|existing| existing != id);
            if bucket.is_empty() {
                self.by_category.remove(&category);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&A> {
        self.assets.get(id)
    }

    pub fn require(&self, id: &str) -> Result<&A, AssetError> {
        self.get(id).ok_or_else(|| AssetError::not_found(A::KIND, id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.assets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn all(&self) -> Vec<&A> {
        self.order.iter().filter_map(|id| self.assets.get(id)).collect()
    }

    pub fn by_category(&self, category: Category) -> Vec<&A> {
        self.by_category
            .get(&category)
            .map(|ids| ids.iter().filter_map(|id| self.assets.get(id)).collect())
            .unwrap_or_default()
    }

    /// Populated categories with their member counts.
    pub fn categories(&self) -> Vec<(Category, usize)> {
        self.by_category
            .iter()
            .map(|(category, ids)| (*category, ids.len()))
            .collect()
    }

    /// Assets carrying at least one of `tags` (case-insensitive).
    pub fn by_tags(&self, tags: &[&str]) -> Vec<&A> {
        self.all()
            .into_iter()
            .filter(|asset| {
                asset
                    .tags()
                    .iter()
                    .any(|tag| tags.iter().any(|wanted| tag.eq_ignore_ascii_case(wanted)))
            })
            .collect()
    }

    /// Case-insensitive substring match over name, description and tags.
    pub fn search(&self, query: &str) -> Vec<&A> {
        let needle = query.to_lowercase();
        self.all()
            .into_iter()
            .filter(|asset| {
                asset.name().to_lowercase().contains(&needle)
                    || asset.description().to_lowercase().contains(&needle)
                    || asset
                        .tags()
                        .iter()
                        .any(|tag| tag.to_lowercase().contains(&needle))
            })
            .collect()
    }
}

impl<A: Asset + DeserializeOwned> AssetRegistry<A> {
    /// Load every `*.json` descriptor in `dir`, in file-name order.
    /// Unreadable or invalid files are skipped with a warning.
    pub fn load_from_dir(dir: &Path) -> Result<Self, AssetError> {
        let mut registry = Self::new();
        if !dir.exists() {
            return Ok(registry);
        }

        let entries = fs::read_dir(dir).map_err(|source| AssetError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_json_file(path))
            .collect();
        paths.sort();

        for path in paths {
            match load_asset_file::<A>(&path) {
                Ok(asset) => {
                    registry.register(asset);
                }
                Err(e) => warn!(kind = %A::KIND, error = %e, "Skipping asset file"),
            }
        }
        Ok(registry)
    }
}

impl<A: Asset> Default for AssetRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_json_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Read and decode one asset descriptor.
pub fn load_asset_file<A: DeserializeOwned>(path: &Path) -> Result<A, AssetError> {
    let content = fs::read_to_string(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| AssetError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Swatch {
        id: String,
        name: String,
        category: Category,
        tags: Vec<String>,
    }

    impl Asset for Swatch {
        const KIND: AssetKind = AssetKind::Theme;

        fn id(&self) -> &str {
            &self.id
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "a swatch"
        }
        fn category(&self) -> Category {
            self.category
        }
        fn tags(&self) -> &[String] {
            &self.tags
        }
    }

    fn swatch(id: &str, category: Category, tags: &[&str]) -> Swatch {
        Swatch {
            id: id.to_string(),
            name: format!("Swatch {}", id),
            category,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn ids(assets: Vec<&Swatch>) -> Vec<&str> {
        assets.into_iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_unregister_drops_empty_bucket() {
        let mut registry = AssetRegistry::new();
        registry.register(swatch("a", Category::Bold, &[]));
        registry.register(swatch("b", Category::Modern, &[]));

        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert!(registry.by_category(Category::Bold).is_empty());
        assert_eq!(registry.categories(), vec![(Category::Modern, 1)]);
    }

    #[test]
    fn test_reregister_moves_category() {
        let mut registry = AssetRegistry::new();
        registry.register_many([
            swatch("a", Category::Bold, &[]),
            swatch("b", Category::Bold, &[]),
            swatch("a", Category::Elegant, &[]),
        ]);

        assert_eq!(ids(registry.by_category(Category::Bold)), vec!["b"]);
        assert_eq!(ids(registry.by_category(Category::Elegant)), vec!["a"]);
        assert_eq!(ids(registry.all()), vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reregister_same_category_does_not_duplicate() {
        let mut registry = AssetRegistry::new();
        registry.register(swatch("a", Category::Bold, &[]));
        let previous = registry.register(swatch("a", Category::Bold, &["x"]));

        assert!(previous.is_some());
        assert_eq!(registry.categories(), vec![(Category::Bold, 1)]);
        assert_eq!(registry.get("a").unwrap().tags, vec!["x".to_string()]);
    }

    #[test]
    fn test_search_matches_any_field() {
        let mut registry = AssetRegistry::new();
        registry.register(swatch("a", Category::Bold, &["Summer"]));
        registry.register(swatch("b", Category::Bold, &["winter"]));

        assert_eq!(ids(registry.search("SUMMER")), vec!["a"]);
        assert_eq!(ids(registry.search("swatch b")), vec!["b"]);
        assert_eq!(ids(registry.search("a swatch")), vec!["a", "b"]);
        assert!(registry.search("autumn").is_empty());
    }

    #[test]
    fn test_by_tags_is_a_union() {
        let mut registry = AssetRegistry::new();
        registry.register(swatch("a", Category::Bold, &["summer"]));
        registry.register(swatch("b", Category::Bold, &["winter"]));
        registry.register(swatch("c", Category::Bold, &["spring"]));

        assert_eq!(ids(registry.by_tags(&["winter", "summer"])), vec!["a", "b"]);
    }

    #[test]
    fn test_require_reports_kind() {
        let registry: AssetRegistry<Swatch> = AssetRegistry::new();
        let err = registry.require("missing").unwrap_err();
        assert_eq!(err.to_string(), "Theme not found: missing");
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Modern".parse::<Category>(), Ok(Category::Modern));
        assert!("baroque".parse::<Category>().is_err());
    }
}
