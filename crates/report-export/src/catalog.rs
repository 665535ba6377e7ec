//! The category catalog: named dimension and metric sets, one export per category.

use std::collections::BTreeMap;
use std::path::Path;

use analytics_reporting::ReportQuery;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog isn't valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown category '{0}'")]
    UnknownCategory(Box<str>),
    #[error("category '{category}': {error}")]
    InvalidCategory {
        category: Box<str>,
        #[source]
        error: analytics_reporting::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub dimensions: Vec<Box<str>>,
    pub metrics: Vec<Box<str>>,
}

/// `{"<category>": {"dimensions": [...], "metrics": [...]}, ...}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    categories: BTreeMap<Box<str>, Category>,
}

impl Catalog {
    pub async fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let bytes = tokio::fs::read(path).await?;
        let catalog = Self::from_slice(&bytes)?;

        info!(
            message = "loaded catalog",
            path = %path.display(),
            categories = catalog.len(),
        );

        Ok(catalog)
    }

    /// Parses a catalog and checks every category builds a valid query.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_slice(bytes)?;

        for name in catalog.names() {
            catalog.query(name, "today", "today")?;
        }

        Ok(catalog)
    }

    pub fn get(&self, category: &str) -> Result<&Category, CatalogError> {
        self.categories
            .get(category)
            .ok_or_else(|| CatalogError::UnknownCategory(category.into()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.categories.keys().map(|name| &**name)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Builds the report query for `category` over an inclusive date range.
    pub fn query(&self, category: &str, start_date: &str, end_date: &str) -> Result<ReportQuery, CatalogError> {
        let Category {
            dimensions,
            metrics,
        } = self.get(category)?;

        ReportQuery::new(start_date, end_date, dimensions.iter().cloned(), metrics.iter().cloned())
            .map_err(|error| CatalogError::InvalidCategory {
                category: category.into(),
                error,
            })
    }
}
