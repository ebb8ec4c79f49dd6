pub mod migrate;
pub mod show;
pub mod status;

pub use migrate::{run_down, run_sync, run_up};
pub use show::run_show;
pub use status::run_status;

use anyhow::{Context, Result};
use std::sync::Arc;

use cairn::{Config, MigrationRegistry, MigrationRunner, SqliteSchemaStore};

/// Open the store, load the migration files and connect the search index
pub fn open_runner(config: &Config) -> Result<MigrationRunner> {
    let registry = MigrationRegistry::from_dir(&config.migrations.dir).with_context(|| {
        format!(
            "Failed to load migrations from {}",
            config.migrations.dir.display()
        )
    })?;
    let store = open_store(config)?;
    let index = config.search.build_index()?;

    tracing::info!(
        migrations = registry.len(),
        index = index.name(),
        "Migration runner ready"
    );
    Ok(MigrationRunner::new(Arc::new(registry), store, index))
}

pub fn open_store(config: &Config) -> Result<SqliteSchemaStore> {
    SqliteSchemaStore::open(&config.store.path).with_context(|| {
        format!(
            "Failed to open schema store at {}",
            config.store.path.display()
        )
    })
}
