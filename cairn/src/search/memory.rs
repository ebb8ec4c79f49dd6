use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{AttributeKind, IndexUpdate, SearchIndex};
use crate::error::{Error, Result};

/// In-process index for tests and dry runs.
///
/// `fail_next` arms a one-shot failure, `fail_updates` a persistent one.
#[derive(Default)]
pub struct MemoryIndex {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    attributes: HashMap<(String, AttributeKind), Vec<String>>,
    calls: Vec<IndexUpdate>,
    fail_next: usize,
    fail_always: bool,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` update calls
    pub fn fail_next(&self, n: usize) {
        self.state.write().fail_next = n;
    }

    /// Fail every update call until cleared
    pub fn fail_updates(&self, fail: bool) {
        self.state.write().fail_always = fail;
    }

    /// Successful updates, in the order they were applied
    pub fn calls(&self) -> Vec<IndexUpdate> {
        self.state.read().calls.clone()
    }

    /// Current attribute list, without going through the async trait
    pub fn get(&self, index: &str, kind: AttributeKind) -> Vec<String> {
        self.state
            .read()
            .attributes
            .get(&(index.to_string(), kind))
            .cloned()
            .unwrap_or_default()
    }

    fn update(&self, index: &str, kind: AttributeKind, attributes: &[String]) -> Result<()> {
        let mut state = self.state.write();
        if state.fail_always {
            return Err(Error::ExternalSync(format!(
                "memory index rejected {} update for '{}'",
                kind, index
            )));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(Error::ExternalSync(format!(
                "memory index rejected {} update for '{}'",
                kind, index
            )));
        }
        state
            .attributes
            .insert((index.to_string(), kind), attributes.to_vec());
        state.calls.push(IndexUpdate {
            index: index.to_string(),
            kind,
            attributes: attributes.to_vec(),
        });
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn update_sortable_attributes(&self, index: &str, attributes: &[String]) -> Result<()> {
        self.update(index, AttributeKind::Sortable, attributes)
    }

    async fn update_filterable_attributes(
        &self,
        index: &str,
        attributes: &[String],
    ) -> Result<()> {
        self.update(index, AttributeKind::Filterable, attributes)
    }

    async fn sortable_attributes(&self, index: &str) -> Result<Vec<String>> {
        Ok(self.get(index, AttributeKind::Sortable))
    }

    async fn filterable_attributes(&self, index: &str) -> Result<Vec<String>> {
        Ok(self.get(index, AttributeKind::Filterable))
    }
}
