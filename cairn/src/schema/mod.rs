//! Collection schema model: collections, fields, rule sets and indexes.

pub mod collection;
pub mod field;
pub mod ids;

pub use collection::{CollectionDefinition, CollectionKind, IndexDefinition, RuleAction, RuleSet};
pub use field::{
    DateOptions, DomainOptions, EditorOptions, FieldDefinition, FieldType, FileOptions,
    JsonOptions, NumberOptions, RelationOptions, SelectOptions, TextOptions,
};
