use rusqlite::{params, OptionalExtension, Transaction};
use std::collections::HashSet;
use tracing::{info, warn};

use super::{
    applied_versions, collection_exists, find_by_id, find_by_identifier, is_retired,
    list_collections, version_to_sql,
};
use crate::error::{Error, Result};
use crate::migration::{Direction, MigrationVersion};
use crate::schema::ids::{generate_unique, COLLECTION_ID_LEN, FIELD_ID_LEN};
use crate::schema::{CollectionDefinition, FieldType};
use crate::search::IndexUpdate;

/// A write transaction on the schema store.
///
/// Dropping it without calling [`SchemaTx::commit`] rolls back every change,
/// including when the drop happens while unwinding from a panic.
pub struct SchemaTx<'a> {
    tx: Transaction<'a>,
}

impl<'a> SchemaTx<'a> {
    pub(crate) fn new(tx: Transaction<'a>) -> Self {
        Self { tx }
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn find_by_identifier(&self, name_or_id: &str) -> Result<CollectionDefinition> {
        find_by_identifier(&self.tx, name_or_id)
    }

    pub fn list_collections(&self) -> Result<Vec<CollectionDefinition>> {
        list_collections(&self.tx)
    }

    pub fn applied_versions(&self) -> Result<Vec<MigrationVersion>> {
        applied_versions(&self.tx)
    }

    /// Validate and persist a collection.
    ///
    /// New collections and fields with an empty id get a fresh one written
    /// back into `def`. Ids of fields dropped by this save are retired.
    pub fn save(&self, def: &mut CollectionDefinition) -> Result<()> {
        self.save_inner(def, SaveMode::Upsert)
    }

    /// Insert a new collection; `Validation` if its id is already stored.
    ///
    /// Unlike [`SchemaTx::save`], an explicit id never turns this into an
    /// update of whatever collection owns it.
    pub fn create(&self, def: &mut CollectionDefinition) -> Result<()> {
        self.save_inner(def, SaveMode::Create)
    }

    /// Point a relation field at another collection.
    ///
    /// This is the only way to change a relation's `collectionId`; a plain
    /// save that does so is rejected.
    pub fn retarget_relation(
        &self,
        collection: &str,
        field: &str,
        target: &str,
    ) -> Result<CollectionDefinition> {
        let mut def = self.find_by_identifier(collection)?;
        let target_id = if target == def.id || target.eq_ignore_ascii_case(&def.name) {
            def.id.clone()
        } else {
            self.find_by_identifier(target)?.id
        };

        let field_def = def.field_mut(field).ok_or_else(|| {
            Error::NotFound(format!("field '{}' in collection '{}'", field, collection))
        })?;
        let field_id = field_def.id.clone();
        match &mut field_def.field_type {
            FieldType::Relation(opts) => opts.collection_id = target_id,
            other => {
                return Err(Error::Validation(format!(
                    "field '{}' is a {} field, not a relation",
                    field,
                    other.type_name()
                )))
            }
        }

        self.save_inner(&mut def, SaveMode::Retarget(&field_id))?;
        Ok(def)
    }

    fn save_inner(&self, def: &mut CollectionDefinition, mode: SaveMode<'_>) -> Result<()> {
        let issues = def.lint();
        if !issues.is_empty() {
            return Err(Error::Validation(format!(
                "collection '{}': {}",
                def.name,
                issues.join("; ")
            )));
        }

        let existing = if def.id.is_empty() {
            None
        } else {
            find_by_id(&self.tx, &def.id)?
        };

        match (&existing, mode) {
            (Some(existing), SaveMode::Create) => {
                return Err(Error::Validation(format!(
                    "cannot create collection '{}': id {} is already used by collection '{}'",
                    def.name, def.id, existing.name
                )));
            }
            (Some(existing), SaveMode::Retarget(field_id)) => {
                check_compatible(existing, def, Some(field_id))?
            }
            (Some(existing), SaveMode::Upsert) => check_compatible(existing, def, None)?,
            (None, _) => {}
        }

        let clash: Option<String> = self
            .tx
            .query_row(
                "SELECT id FROM _collections WHERE name = ?1 COLLATE NOCASE AND id != ?2",
                params![def.name, def.id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(other) = clash {
            return Err(Error::Validation(format!(
                "collection name '{}' is already used by collection {}",
                def.name, other
            )));
        }

        if def.id.is_empty() {
            def.id = generate_unique(COLLECTION_ID_LEN, |candidate| {
                Ok(collection_exists(&self.tx, candidate)? || is_retired(&self.tx, candidate)?)
            })?;
        }
        for i in 0..def.fields.len() {
            if def.fields[i].id.is_empty() {
                let id = generate_unique(FIELD_ID_LEN, |candidate| {
                    field_id_taken(&self.tx, &*def, existing.as_ref(), candidate)
                })?;
                def.fields[i].id = id;
            }
        }

        for (field, target) in def.relations() {
            if target != def.id && !collection_exists(&self.tx, target)? {
                return Err(Error::Validation(format!(
                    "relation field '{}' targets unknown collection '{}'",
                    field.name, target
                )));
            }
        }

        if let Some(existing) = &existing {
            let kept: HashSet<&str> = def.fields.iter().map(|f| f.id.as_str()).collect();
            for removed in existing.fields.iter().filter(|f| !kept.contains(f.id.as_str())) {
                self.retire(&removed.id)?;
            }
        }

        let json = serde_json::to_string(&*def)?;
        self.tx.execute(
            "INSERT INTO _collections (id, name, definition) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, definition = excluded.definition",
            params![def.id, def.name, json],
        )?;

        info!(
            collection = %def.name,
            id = %def.id,
            fields = def.fields.len(),
            created = existing.is_none(),
            "Saved collection"
        );
        Ok(())
    }

    /// Delete a collection.
    ///
    /// Fails with `Conflict` while another collection holds a non-cascading
    /// relation to it. The collection id and its field ids are retired.
    pub fn delete(&self, def: &CollectionDefinition) -> Result<()> {
        let identifier = if def.id.is_empty() { &def.name } else { &def.id };
        let stored = self.find_by_identifier(identifier)?;

        if stored.system {
            return Err(Error::Validation(format!(
                "system collection '{}' cannot be deleted",
                stored.name
            )));
        }

        let mut cascading = Vec::new();
        for other in self.list_collections()? {
            if other.id == stored.id {
                continue;
            }
            for (field, target) in other.relations() {
                if target != stored.id {
                    continue;
                }
                let cascade = field.relation().is_some_and(|r| r.cascade_delete);
                if !cascade {
                    return Err(Error::Conflict(format!(
                        "collection '{}' is referenced by {}.{} (cascadeDelete is off)",
                        stored.name, other.name, field.name
                    )));
                }
                cascading.push(format!("{}.{}", other.name, field.name));
            }
        }
        if !cascading.is_empty() {
            warn!(
                collection = %stored.name,
                references = ?cascading,
                "Deleting collection with cascading references; dependent records are removed by the store"
            );
        }

        self.tx
            .execute("DELETE FROM _collections WHERE id = ?1", params![stored.id])?;
        self.retire(&stored.id)?;
        for field in &stored.fields {
            self.retire(&field.id)?;
        }

        info!(collection = %stored.name, id = %stored.id, "Deleted collection");
        Ok(())
    }

    pub fn record_applied(&self, version: MigrationVersion, name: &str) -> Result<()> {
        self.tx.execute(
            "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![version_to_sql(version)?, name, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Remove a version from the ledger; `NotFound` if it was not applied
    pub fn remove_applied(&self, version: MigrationVersion) -> Result<()> {
        let removed = self.tx.execute(
            "DELETE FROM _migrations WHERE version = ?1",
            params![version_to_sql(version)?],
        )?;
        if removed == 0 {
            return Err(Error::NotFound(format!("applied migration {}", version)));
        }
        Ok(())
    }

    /// Persist an index update to be issued after commit
    pub fn enqueue_index_update(
        &self,
        version: MigrationVersion,
        direction: Direction,
        update: &IndexUpdate,
    ) -> Result<()> {
        self.tx.execute(
            "INSERT INTO _index_sync_outbox (version, direction, index_name, kind, attributes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                version_to_sql(version)?,
                direction.as_str(),
                update.index,
                update.kind.as_str(),
                serde_json::to_string(&update.attributes)?
            ],
        )?;
        Ok(())
    }

    fn retire(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Ok(());
        }
        self.tx.execute(
            "INSERT OR IGNORE INTO _retired_ids (id, retired_at) VALUES (?1, ?2)",
            params![id, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum SaveMode<'s> {
    Upsert,
    Create,
    /// Upsert that may move the relation field with this id
    Retarget(&'s str),
}

/// A field id is taken while any field of the collection, before or after
/// this save, holds it, or once it has been retired.
fn field_id_taken(
    conn: &rusqlite::Connection,
    def: &CollectionDefinition,
    existing: Option<&CollectionDefinition>,
    candidate: &str,
) -> Result<bool> {
    let held = def
        .fields
        .iter()
        .chain(existing.into_iter().flat_map(|e| e.fields.iter()))
        .any(|f| f.id == candidate);
    Ok(held || is_retired(conn, candidate)?)
}

/// Changes an update may not make to an existing collection
fn check_compatible(
    existing: &CollectionDefinition,
    updated: &CollectionDefinition,
    retarget: Option<&str>,
) -> Result<()> {
    if existing.kind != updated.kind {
        return Err(Error::Validation(format!(
            "collection '{}' cannot change type from {} to {}",
            existing.name, existing.kind, updated.kind
        )));
    }

    for field in &updated.fields {
        let Some(old) = existing.fields.iter().find(|f| f.id == field.id) else {
            continue;
        };
        if !old.field_type.same_variant(&field.field_type) {
            return Err(Error::Validation(format!(
                "field '{}' ({}) cannot change type from {} to {}",
                field.name,
                field.id,
                old.field_type.type_name(),
                field.field_type.type_name()
            )));
        }
        if let (Some(before), Some(after)) = (old.relation(), field.relation()) {
            if before.collection_id != after.collection_id && retarget != Some(field.id.as_str()) {
                return Err(Error::Validation(format!(
                    "relation field '{}' cannot change its target collection with a plain save; use retarget_relation",
                    field.name
                )));
            }
        }
    }
    Ok(())
}
