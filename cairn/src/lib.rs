//! Versioned schema migrations for a document-collection store.
//!
//! Collections, their fields and authorization rules live in a SQLite
//! [`store`]. Migrations are registered in a [`MigrationRegistry`] (in code or
//! from YAML files) and applied or reverted by a [`MigrationRunner`], which
//! also keeps an external [`search`] index's sortable and filterable
//! attributes in step with the schema.

pub mod config;
pub mod error;
pub mod metrics;
pub mod migration;
pub mod schema;
pub mod search;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use migration::{
    Direction, MigrationContext, MigrationFile, MigrationRecord, MigrationRegistry,
    MigrationRunner, MigrationVersion, RunReport, RunnerState, SchemaOp, Target,
};
pub use schema::{CollectionDefinition, CollectionKind, FieldDefinition, FieldType, RuleAction, RuleSet};
pub use search::{DisabledIndex, IndexUpdate, MeilisearchIndex, MemoryIndex, SearchIndex};
pub use store::{SchemaTx, SqliteSchemaStore};
