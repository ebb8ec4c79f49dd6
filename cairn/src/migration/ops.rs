//! Declarative schema operations used by migration files.
//!
//! ```yaml
//! up:
//!   - op: set_rule
//!     collection: trails
//!     action: list
//!     rule: "author = @request.auth.id || public = true"
//! down:
//!   - op: set_rule
//!     collection: trails
//!     action: list
//!     rule: "author = @request.auth.id"
//! ```

use serde::{Deserialize, Serialize};

use super::MigrationContext;
use crate::error::{Error, Result};
use crate::schema::{CollectionDefinition, FieldDefinition, IndexDefinition, RuleAction};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaOp {
    CreateCollection {
        collection: CollectionDefinition,
    },
    DeleteCollection {
        collection: String,
    },
    RenameCollection {
        collection: String,
        to: String,
    },
    /// Add a field, or replace the field with the same id (or, for a field
    /// without id, the same name)
    UpsertField {
        collection: String,
        field: FieldDefinition,
    },
    RemoveField {
        collection: String,
        field: String,
    },
    /// `rule: null` (or omitted) restores the superuser-only marker
    SetRule {
        collection: String,
        action: RuleAction,
        #[serde(default)]
        rule: Option<String>,
    },
    AddIndex {
        collection: String,
        index: IndexDefinition,
    },
    DropIndex {
        collection: String,
        index: String,
    },
    SetSortableAttributes {
        index: String,
        attributes: Vec<String>,
    },
    SetFilterableAttributes {
        index: String,
        attributes: Vec<String>,
    },
}

impl SchemaOp {
    /// Operation name as written in migration files
    pub fn kind(&self) -> &'static str {
        match self {
            SchemaOp::CreateCollection { .. } => "create_collection",
            SchemaOp::DeleteCollection { .. } => "delete_collection",
            SchemaOp::RenameCollection { .. } => "rename_collection",
            SchemaOp::UpsertField { .. } => "upsert_field",
            SchemaOp::RemoveField { .. } => "remove_field",
            SchemaOp::SetRule { .. } => "set_rule",
            SchemaOp::AddIndex { .. } => "add_index",
            SchemaOp::DropIndex { .. } => "drop_index",
            SchemaOp::SetSortableAttributes { .. } => "set_sortable_attributes",
            SchemaOp::SetFilterableAttributes { .. } => "set_filterable_attributes",
        }
    }

    pub fn apply_all(ops: &[SchemaOp], ctx: &mut MigrationContext<'_>) -> Result<()> {
        for op in ops {
            op.apply(ctx)?;
        }
        Ok(())
    }

    pub fn apply(&self, ctx: &mut MigrationContext<'_>) -> Result<()> {
        tracing::debug!(version = %ctx.version(), op = self.kind(), "Applying schema op");

        match self {
            SchemaOp::CreateCollection { collection } => {
                let mut def = collection.clone();
                ctx.create_collection(&mut def)
            }
            SchemaOp::DeleteCollection { collection } => {
                let def = ctx.find_collection(collection)?;
                ctx.delete_collection(&def)
            }
            SchemaOp::RenameCollection { collection, to } => {
                let mut def = ctx.find_collection(collection)?;
                def.name = to.clone();
                ctx.save_collection(&mut def)
            }
            SchemaOp::UpsertField { collection, field } => {
                let mut def = ctx.find_collection(collection)?;
                let mut field = field.clone();
                if field.id.is_empty() {
                    if let Some(existing) = def.field(&field.name) {
                        field.id = existing.id.clone();
                    }
                }
                def.add_field(field);
                ctx.save_collection(&mut def)
            }
            SchemaOp::RemoveField { collection, field } => {
                let mut def = ctx.find_collection(collection)?;
                if def.remove_field(field).is_none() {
                    return Err(Error::NotFound(format!(
                        "field '{}' in collection '{}'",
                        field, collection
                    )));
                }
                ctx.save_collection(&mut def)
            }
            SchemaOp::SetRule {
                collection,
                action,
                rule,
            } => {
                let mut def = ctx.find_collection(collection)?;
                def.rules.set(*action, rule.clone());
                ctx.save_collection(&mut def)
            }
            SchemaOp::AddIndex { collection, index } => {
                let mut def = ctx.find_collection(collection)?;
                def.indexes.push(index.clone());
                ctx.save_collection(&mut def)
            }
            SchemaOp::DropIndex { collection, index } => {
                let mut def = ctx.find_collection(collection)?;
                let before = def.indexes.len();
                def.indexes.retain(|i| i.name != *index);
                if def.indexes.len() == before {
                    return Err(Error::NotFound(format!(
                        "index '{}' on collection '{}'",
                        index, collection
                    )));
                }
                ctx.save_collection(&mut def)
            }
            SchemaOp::SetSortableAttributes { index, attributes } => {
                ctx.sync_sortable_attributes(index, attributes.iter().cloned());
                Ok(())
            }
            SchemaOp::SetFilterableAttributes { index, attributes } => {
                ctx.sync_filterable_attributes(index, attributes.iter().cloned());
                Ok(())
            }
        }
    }
}
