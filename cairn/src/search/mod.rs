//! Search index attribute synchronization.
//!
//! Migrations keep the external index's sortable and filterable attribute
//! lists in line with the collection schema. The runner queues every call in
//! the step transaction and issues it once the step has committed.

mod meilisearch;
mod memory;

pub use meilisearch::MeilisearchIndex;
pub use memory::MemoryIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Which attribute list of an index an update replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    Sortable,
    Filterable,
}

impl AttributeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::Sortable => "sortable",
            AttributeKind::Filterable => "filterable",
        }
    }
}

impl FromStr for AttributeKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sortable" => Ok(AttributeKind::Sortable),
            "filterable" => Ok(AttributeKind::Filterable),
            other => Err(format!("unknown attribute kind '{}'", other)),
        }
    }
}

impl std::fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A full replacement of one attribute list on one index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexUpdate {
    pub index: String,
    pub kind: AttributeKind,
    pub attributes: Vec<String>,
}

impl IndexUpdate {
    pub fn sortable<I, S>(index: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index: index.into(),
            kind: AttributeKind::Sortable,
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn filterable<I, S>(index: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index: index.into(),
            kind: AttributeKind::Filterable,
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }
}

/// External search index that owns sortable/filterable attribute settings.
///
/// Every update replaces the whole list. Implementations do not retry;
/// any failure is reported as [`Error::ExternalSync`].
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Short name for logs and metrics
    fn name(&self) -> &'static str;

    async fn update_sortable_attributes(&self, index: &str, attributes: &[String]) -> Result<()>;

    async fn update_filterable_attributes(&self, index: &str, attributes: &[String])
        -> Result<()>;

    async fn sortable_attributes(&self, index: &str) -> Result<Vec<String>>;

    async fn filterable_attributes(&self, index: &str) -> Result<Vec<String>>;

    /// Issue a queued update
    async fn apply(&self, update: &IndexUpdate) -> Result<()> {
        match update.kind {
            AttributeKind::Sortable => {
                self.update_sortable_attributes(&update.index, &update.attributes)
                    .await
            }
            AttributeKind::Filterable => {
                self.update_filterable_attributes(&update.index, &update.attributes)
                    .await
            }
        }
    }
}

/// Index used when no search endpoint is configured; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledIndex;

impl DisabledIndex {
    fn unavailable(index: &str) -> Error {
        Error::ExternalSync(format!(
            "no search index configured (needed for '{}'); set [search] url or MEILI_URL",
            index
        ))
    }
}

#[async_trait]
impl SearchIndex for DisabledIndex {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn update_sortable_attributes(&self, index: &str, _attributes: &[String]) -> Result<()> {
        Err(Self::unavailable(index))
    }

    async fn update_filterable_attributes(
        &self,
        index: &str,
        _attributes: &[String],
    ) -> Result<()> {
        Err(Self::unavailable(index))
    }

    async fn sortable_attributes(&self, index: &str) -> Result<Vec<String>> {
        Err(Self::unavailable(index))
    }

    async fn filterable_attributes(&self, index: &str) -> Result<Vec<String>> {
        Err(Self::unavailable(index))
    }
}
