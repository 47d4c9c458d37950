//! Nominee catalog
//!
//! An immutable reference table of award categories and their nominees,
//! built once at startup from a versioned JSON snapshot. All lookups are
//! read-only; nothing mutates the catalog after it is loaded.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

/// Snapshot compiled into the binary
const EMBEDDED_SNAPSHOT: &str = include_str!("../data/nominees2026.json");

/// Snapshot format this build understands
pub const SUPPORTED_SNAPSHOT_VERSION: u32 = 1;

static EMBEDDED: LazyLock<Result<Catalog, CatalogError>> =
    LazyLock::new(|| Catalog::from_json(EMBEDDED_SNAPSHOT));

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Unsupported catalog version {0} (expected {SUPPORTED_SNAPSHOT_VERSION})")]
    UnsupportedVersion(u32),
    #[error("Duplicate category id: {0}")]
    DuplicateCategory(String),
    #[error("Duplicate nominee id: {0}")]
    DuplicateNominee(String),
    #[error("Embedded catalog is invalid: {0}")]
    Embedded(String),
}

/// A single nominee within a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nominee {
    pub id: String,
    pub title: String,
    pub film: String,
    pub info: String,
}

/// An award category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub nominees: Vec<Nominee>,
}

impl Category {
    pub fn nominee(&self, nominee_id: &str) -> Option<&Nominee> {
        self.nominees.iter().find(|n| n.id == nominee_id)
    }
}

/// Categories matched by a free-text search, with the nominees that matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub category_id: String,
    pub category_name: String,
    pub nominees: Vec<Nominee>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    version: u32,
    #[serde(default)]
    ceremony: Option<String>,
    categories: Vec<Category>,
}

/// Indexed, read-only catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    ceremony: Option<String>,
    categories: Vec<Category>,
    category_index: HashMap<String, usize>,
    /// nominee id -> (category index, nominee index)
    nominee_index: HashMap<String, (usize, usize)>,
}

impl Catalog {
    /// Parse and index a snapshot
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        if snapshot.version != SUPPORTED_SNAPSHOT_VERSION {
            return Err(CatalogError::UnsupportedVersion(snapshot.version));
        }
        Self::build(snapshot.ceremony, snapshot.categories)
    }

    /// Load a snapshot from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The snapshot compiled into this binary
    pub fn embedded() -> Result<&'static Catalog, CatalogError> {
        EMBEDDED
            .as_ref()
            .map_err(|e| CatalogError::Embedded(e.to_string()))
    }

    /// Index categories received from elsewhere, e.g. the catalog endpoint
    pub fn from_categories(
        ceremony: Option<String>,
        categories: Vec<Category>,
    ) -> Result<Self, CatalogError> {
        Self::build(ceremony, categories)
    }

    fn build(ceremony: Option<String>, categories: Vec<Category>) -> Result<Self, CatalogError> {
        let mut category_index = HashMap::new();
        let mut nominee_index = HashMap::new();

        for (ci, category) in categories.iter().enumerate() {
            if category_index.insert(category.id.clone(), ci).is_some() {
                return Err(CatalogError::DuplicateCategory(category.id.clone()));
            }
            for (ni, nominee) in category.nominees.iter().enumerate() {
                if nominee_index.insert(nominee.id.clone(), (ci, ni)).is_some() {
                    return Err(CatalogError::DuplicateNominee(nominee.id.clone()));
                }
            }
        }

        Ok(Self {
            ceremony,
            categories,
            category_index,
            nominee_index,
        })
    }

    pub fn ceremony(&self) -> Option<&str> {
        self.ceremony.as_deref()
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn total_categories(&self) -> usize {
        self.categories.len()
    }

    pub fn category(&self, category_id: &str) -> Option<&Category> {
        self.category_index
            .get(category_id)
            .map(|&i| &self.categories[i])
    }

    /// Resolve a nominee id to the nominee and the category it belongs to
    pub fn nominee(&self, nominee_id: &str) -> Option<(&Nominee, &Category)> {
        self.nominee_index.get(nominee_id).map(|&(ci, ni)| {
            let category = &self.categories[ci];
            (&category.nominees[ni], category)
        })
    }

    /// Display title for a nominee id, if it resolves
    pub fn nominee_title(&self, nominee_id: &str) -> Option<&str> {
        self.nominee(nominee_id).map(|(n, _)| n.title.as_str())
    }

    /// Case-insensitive free-text search.
    ///
    /// A category whose name matches is returned whole, and its nominees are
    /// not matched individually. Otherwise nominees are matched on title,
    /// film, and info, grouped by category in catalog order.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        if query.is_empty() {
            return Vec::new();
        }
        let q = query.to_lowercase();
        let mut hits = Vec::new();

        for category in &self.categories {
            if category.name.to_lowercase().contains(&q) {
                hits.push(SearchHit {
                    category_id: category.id.clone(),
                    category_name: category.name.clone(),
                    nominees: category.nominees.clone(),
                });
                continue;
            }

            let matched: Vec<Nominee> = category
                .nominees
                .iter()
                .filter(|n| {
                    n.title.to_lowercase().contains(&q)
                        || n.film.to_lowercase().contains(&q)
                        || n.info.to_lowercase().contains(&q)
                })
                .cloned()
                .collect();

            if !matched.is_empty() {
                hits.push(SearchHit {
                    category_id: category.id.clone(),
                    category_name: category.name.clone(),
                    nominees: matched,
                });
            }
        }

        hits
    }
}
