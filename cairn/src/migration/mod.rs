//! Versioned, reversible schema migrations.
//!
//! A [`MigrationRegistry`] holds every known migration, ordered by version.
//! The [`MigrationRunner`] applies or reverts them one step at a time, each
//! step inside its own store transaction, and pushes queued search index
//! updates once the step has committed.

pub mod loader;
pub mod ops;
pub mod registry;
pub mod runner;
mod version;

pub use loader::{load_dir, MigrationFile, MigrationLoader};
pub use ops::SchemaOp;
pub use registry::MigrationRegistry;
pub use runner::{MigrationRunner, MigrationStatus, RunReport, RunnerState, StatusReport, Target};
pub use version::{Direction, MigrationVersion};

use crate::error::Result;
use crate::schema::CollectionDefinition;
use crate::search::IndexUpdate;
use crate::store::SchemaTx;

/// Body of an `up` or `down` step
pub type StepFn = Box<dyn Fn(&mut MigrationContext<'_>) -> Result<()> + Send + Sync>;

/// A registered migration: a version and the two operations that move the
/// schema across it.
pub struct MigrationRecord {
    pub version: MigrationVersion,
    pub name: String,
    pub up: StepFn,
    pub down: StepFn,
}

impl MigrationRecord {
    pub(crate) fn step(&self, direction: Direction) -> &StepFn {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }
}

impl std::fmt::Debug for MigrationRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRecord")
            .field("version", &self.version)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// What a migration step sees: the open store transaction plus a queue of
/// search index updates to issue after commit.
pub struct MigrationContext<'a> {
    tx: SchemaTx<'a>,
    version: MigrationVersion,
    direction: Direction,
    index_updates: Vec<IndexUpdate>,
}

impl<'a> MigrationContext<'a> {
    pub(crate) fn new(tx: SchemaTx<'a>, version: MigrationVersion, direction: Direction) -> Self {
        Self {
            tx,
            version,
            direction,
            index_updates: Vec::new(),
        }
    }

    pub fn version(&self) -> MigrationVersion {
        self.version
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The underlying store transaction
    pub fn store(&self) -> &SchemaTx<'a> {
        &self.tx
    }

    pub fn find_collection(&self, name_or_id: &str) -> Result<CollectionDefinition> {
        self.tx.find_by_identifier(name_or_id)
    }

    pub fn save_collection(&self, def: &mut CollectionDefinition) -> Result<()> {
        self.tx.save(def)
    }

    /// Insert a collection that must not exist yet
    pub fn create_collection(&self, def: &mut CollectionDefinition) -> Result<()> {
        self.tx.create(def)
    }

    pub fn delete_collection(&self, def: &CollectionDefinition) -> Result<()> {
        self.tx.delete(def)
    }

    pub fn retarget_relation(
        &self,
        collection: &str,
        field: &str,
        target: &str,
    ) -> Result<CollectionDefinition> {
        self.tx.retarget_relation(collection, field, target)
    }

    /// Queue a replacement of the index's sortable attributes
    pub fn sync_sortable_attributes<I, S>(&mut self, index: &str, attributes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index_updates
            .push(IndexUpdate::sortable(index, attributes));
    }

    /// Queue a replacement of the index's filterable attributes
    pub fn sync_filterable_attributes<I, S>(&mut self, index: &str, attributes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index_updates
            .push(IndexUpdate::filterable(index, attributes));
    }

    pub fn queued_index_updates(&self) -> &[IndexUpdate] {
        &self.index_updates
    }

    pub(crate) fn into_parts(self) -> (SchemaTx<'a>, Vec<IndexUpdate>) {
        (self.tx, self.index_updates)
    }
}
