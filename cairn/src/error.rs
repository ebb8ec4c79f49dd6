use crate::migration::{Direction, MigrationVersion};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate migration version: {0}")]
    DuplicateVersion(MigrationVersion),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("External index sync failed: {0}")]
    ExternalSync(String),

    #[error("Migration {0} is already applied")]
    AlreadyApplied(MigrationVersion),

    /// A registered version sits below the highest applied one but was never applied.
    #[error("Migration {missing} is not applied but {max_applied} is; migrations must be applied sequentially")]
    LedgerGap {
        missing: MigrationVersion,
        max_applied: MigrationVersion,
    },

    #[error("Migration {version} failed during {direction}: {source}")]
    Step {
        version: MigrationVersion,
        direction: Direction,
        #[source]
        source: Box<Error>,
    },

    #[error("Migration step panicked: {0}")]
    StepPanicked(String),

    #[error("Migration file error: {0}")]
    Migration(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error type as a string for metrics labeling
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::DuplicateVersion(_) => "duplicate_version",
            Error::Validation(_) => "validation",
            Error::Conflict(_) => "conflict",
            Error::ExternalSync(_) => "external_sync",
            Error::AlreadyApplied(_) => "already_applied",
            Error::LedgerGap { .. } => "ledger_gap",
            Error::Step { source, .. } => source.error_type(),
            Error::StepPanicked(_) => "panic",
            Error::Migration(_) => "migration_file",
            Error::Config(_) => "config",
            Error::Sqlite(_) => "sqlite",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Io(_) => "io",
        }
    }

    /// Version of the migration step that produced this error, if any.
    pub fn failed_version(&self) -> Option<MigrationVersion> {
        match self {
            Error::Step { version, .. } => Some(*version),
            _ => None,
        }
    }

    /// The underlying cause, looking through step wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Step { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
