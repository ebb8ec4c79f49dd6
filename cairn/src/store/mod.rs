//! SQLite-backed collection schema store.
//!
//! Holds collection definitions, the migration ledger, retired ids and the
//! index-sync outbox in one database so a migration step can change all of
//! them in a single transaction.

mod tx;

pub use tx::SchemaTx;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::{Error, Result};
use crate::migration::{Direction, MigrationVersion};
use crate::schema::CollectionDefinition;
use crate::search::IndexUpdate;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS _collections (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE COLLATE NOCASE,
    definition  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS _migrations (
    version     INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    applied_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS _retired_ids (
    id          TEXT PRIMARY KEY,
    retired_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS _index_sync_outbox (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    version     INTEGER NOT NULL,
    direction   TEXT NOT NULL,
    index_name  TEXT NOT NULL,
    kind        TEXT NOT NULL,
    attributes  TEXT NOT NULL
);
"#;

/// One applied migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub version: MigrationVersion,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// A committed index update that has not been issued yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    pub id: i64,
    pub version: MigrationVersion,
    pub direction: Direction,
    pub update: IndexUpdate,
}

/// Schema store over a single SQLite connection.
///
/// Reads go straight to the connection; every write happens inside a
/// [`SchemaTx`], which rolls back unless committed.
pub struct SqliteSchemaStore {
    conn: Connection,
}

impl SqliteSchemaStore {
    /// Open (or create) the store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;",
        )?;
        conn.execute_batch(SCHEMA)?;

        tracing::debug!(path = %path.as_ref().display(), "Opened schema store");
        Ok(Self { conn })
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Start a write transaction
    pub fn transaction(&mut self) -> Result<SchemaTx<'_>> {
        Ok(SchemaTx::new(self.conn.transaction()?))
    }

    /// Find a collection by id, or by name (case-insensitive)
    pub fn find_by_identifier(&self, name_or_id: &str) -> Result<CollectionDefinition> {
        find_by_identifier(&self.conn, name_or_id)
    }

    /// All collections, ordered by name
    pub fn list_collections(&self) -> Result<Vec<CollectionDefinition>> {
        list_collections(&self.conn)
    }

    /// Save a single collection in its own transaction
    pub fn save(&mut self, def: &mut CollectionDefinition) -> Result<()> {
        let tx = self.transaction()?;
        tx.save(def)?;
        tx.commit()
    }

    /// Create a single collection in its own transaction
    pub fn create(&mut self, def: &mut CollectionDefinition) -> Result<()> {
        let tx = self.transaction()?;
        tx.create(def)?;
        tx.commit()
    }

    /// Delete a single collection in its own transaction
    pub fn delete(&mut self, def: &CollectionDefinition) -> Result<()> {
        let tx = self.transaction()?;
        tx.delete(def)?;
        tx.commit()
    }

    /// Applied versions, ascending
    pub fn applied_versions(&self) -> Result<Vec<MigrationVersion>> {
        applied_versions(&self.conn)
    }

    /// Applied migrations with names and timestamps, ascending
    pub fn ledger(&self) -> Result<Vec<LedgerEntry>> {
        ledger(&self.conn)
    }

    /// Index updates committed but not yet issued, oldest first
    pub fn pending_index_updates(&self) -> Result<Vec<OutboxEntry>> {
        pending_outbox(&self.conn)
    }

    /// Drop an outbox entry once its index call succeeded
    pub fn complete_index_update(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM _index_sync_outbox WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn is_retired(&self, id: &str) -> Result<bool> {
        is_retired(&self.conn, id)
    }
}

// ============================================================================
// Queries shared by the store and its transactions
// ============================================================================

pub(crate) fn version_to_sql(version: MigrationVersion) -> Result<i64> {
    i64::try_from(version.get())
        .map_err(|_| Error::Validation(format!("migration version {} is out of range", version)))
}

fn version_from_sql(value: i64) -> Result<MigrationVersion> {
    u64::try_from(value)
        .map(MigrationVersion::new)
        .map_err(|_| Error::Validation(format!("negative migration version {} in ledger", value)))
}

fn decode_definition(json: &str) -> Result<CollectionDefinition> {
    Ok(serde_json::from_str(json)?)
}

pub(crate) fn find_by_id(conn: &Connection, id: &str) -> Result<Option<CollectionDefinition>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT definition FROM _collections WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    json.as_deref().map(decode_definition).transpose()
}

pub(crate) fn find_by_identifier(
    conn: &Connection,
    name_or_id: &str,
) -> Result<CollectionDefinition> {
    if let Some(def) = find_by_id(conn, name_or_id)? {
        return Ok(def);
    }

    let json: Option<String> = conn
        .query_row(
            "SELECT definition FROM _collections WHERE name = ?1 COLLATE NOCASE",
            params![name_or_id],
            |row| row.get(0),
        )
        .optional()?;

    match json {
        Some(json) => decode_definition(&json),
        None => Err(Error::NotFound(format!("collection '{}'", name_or_id))),
    }
}

pub(crate) fn list_collections(conn: &Connection) -> Result<Vec<CollectionDefinition>> {
    let mut stmt = conn.prepare("SELECT definition FROM _collections ORDER BY name COLLATE NOCASE")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut collections = Vec::new();
    for json in rows {
        collections.push(decode_definition(&json?)?);
    }
    Ok(collections)
}

pub(crate) fn collection_exists(conn: &Connection, id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM _collections WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn is_retired(conn: &Connection, id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM _retired_ids WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn applied_versions(conn: &Connection) -> Result<Vec<MigrationVersion>> {
    let mut stmt = conn.prepare("SELECT version FROM _migrations ORDER BY version")?;
    let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;

    let mut versions = Vec::new();
    for version in rows {
        versions.push(version_from_sql(version?)?);
    }
    Ok(versions)
}

pub(crate) fn ledger(conn: &Connection) -> Result<Vec<LedgerEntry>> {
    let mut stmt =
        conn.prepare("SELECT version, name, applied_at FROM _migrations ORDER BY version")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (version, name, applied_at) = row?;
        let applied_at = DateTime::parse_from_rfc3339(&applied_at)
            .map_err(|e| Error::Validation(format!("bad applied_at '{}': {}", applied_at, e)))?
            .with_timezone(&Utc);
        entries.push(LedgerEntry {
            version: version_from_sql(version)?,
            name,
            applied_at,
        });
    }
    Ok(entries)
}

pub(crate) fn pending_outbox(conn: &Connection) -> Result<Vec<OutboxEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, version, direction, index_name, kind, attributes
         FROM _index_sync_outbox ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, version, direction, index, kind, attributes) = row?;
        entries.push(OutboxEntry {
            id,
            version: version_from_sql(version)?,
            direction: direction.parse().map_err(Error::Validation)?,
            update: IndexUpdate {
                index,
                kind: kind.parse().map_err(Error::Validation)?,
                attributes: serde_json::from_str(&attributes)?,
            },
        });
    }
    Ok(entries)
}
