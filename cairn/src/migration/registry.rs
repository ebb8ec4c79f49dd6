use std::collections::BTreeMap;
use std::path::Path;

use super::loader::{load_dir, MigrationFile};
use super::ops::SchemaOp;
use super::{MigrationContext, MigrationRecord, MigrationVersion};
use crate::error::{Error, Result};

/// Ordered catalog of migrations.
///
/// Built once at startup, then shared read-only (usually behind an `Arc`).
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    records: BTreeMap<MigrationVersion, MigrationRecord>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every migration file found in `dir`
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let mut registry = Self::new();
        for file in load_dir(dir)? {
            registry.register_file(file)?;
        }
        Ok(registry)
    }

    pub fn register<U, D>(
        &mut self,
        version: impl Into<MigrationVersion>,
        name: impl Into<String>,
        up: U,
        down: D,
    ) -> Result<()>
    where
        U: Fn(&mut MigrationContext<'_>) -> Result<()> + Send + Sync + 'static,
        D: Fn(&mut MigrationContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let version = version.into();
        let name: String = name.into();
        if version == MigrationVersion::ZERO {
            // 0 is the "nothing applied" ledger position
            return Err(Error::Validation(format!(
                "migration '{}' cannot use version 0",
                name
            )));
        }
        if self.records.contains_key(&version) {
            return Err(Error::DuplicateVersion(version));
        }

        let record = MigrationRecord {
            version,
            name,
            up: Box::new(up),
            down: Box::new(down),
        };
        tracing::debug!(version = %version, name = %record.name, "Registered migration");
        self.records.insert(version, record);
        Ok(())
    }

    /// Register a declarative migration file
    pub fn register_file(&mut self, file: MigrationFile) -> Result<()> {
        let MigrationFile {
            version,
            name,
            up,
            down,
        } = file;
        self.register(
            version,
            name,
            move |ctx: &mut MigrationContext<'_>| SchemaOp::apply_all(&up, ctx),
            move |ctx: &mut MigrationContext<'_>| SchemaOp::apply_all(&down, ctx),
        )
    }

    /// Records ascending by version. Every call starts a fresh iteration.
    pub fn ordered(&self) -> impl Iterator<Item = &MigrationRecord> + '_ {
        self.records.values()
    }

    pub fn get(&self, version: MigrationVersion) -> Option<&MigrationRecord> {
        self.records.get(&version)
    }

    pub fn contains(&self, version: MigrationVersion) -> bool {
        self.records.contains_key(&version)
    }

    /// Highest registered version
    pub fn latest(&self) -> Option<MigrationVersion> {
        self.records.keys().next_back().copied()
    }

    pub fn versions(&self) -> Vec<MigrationVersion> {
        self.records.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
