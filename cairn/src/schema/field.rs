//! Field definitions and their type-specific options.
//!
//! On the wire a field is `{"id", "name", "type", "options": {...}, flags}`.
//! The `options` object is parsed into the per-type struct as soon as the
//! field is deserialized, so nothing downstream handles untyped options.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// Pattern shared by collection names, field names and ids.
pub(crate) fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static pattern is valid"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawField", into = "RawField")]
pub struct FieldDefinition {
    /// Stable identity. Empty until the store assigns one.
    pub id: String,
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub unique: bool,
    pub presentable: bool,
    pub system: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            field_type,
            required: false,
            unique: false,
            presentable: false,
            system: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn presentable(mut self) -> Self {
        self.presentable = true;
        self
    }

    /// Relation options if this is a relation field
    pub fn relation(&self) -> Option<&RelationOptions> {
        match &self.field_type {
            FieldType::Relation(opts) => Some(opts),
            _ => None,
        }
    }

    /// Structural issues with this field (empty = ok)
    pub fn lint(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let label = if self.name.is_empty() { "<unnamed>" } else { &self.name };

        if !identifier_pattern().is_match(&self.name) {
            issues.push(format!(
                "field name '{}' must be non-empty and contain only letters, digits and underscores",
                self.name
            ));
        }
        if !self.id.is_empty() && !identifier_pattern().is_match(&self.id) {
            issues.push(format!("field '{}' has an invalid id '{}'", label, self.id));
        }
        for issue in self.field_type.lint() {
            issues.push(format!("field '{}': {}", label, issue));
        }
        issues
    }
}

/// Field type with its type-specific options.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Text(TextOptions),
    Number(NumberOptions),
    Bool,
    Email(DomainOptions),
    Url(DomainOptions),
    Editor(EditorOptions),
    Date(DateOptions),
    Select(SelectOptions),
    Json(JsonOptions),
    File(FileOptions),
    Relation(RelationOptions),
}

impl FieldType {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Text(_) => "text",
            FieldType::Number(_) => "number",
            FieldType::Bool => "bool",
            FieldType::Email(_) => "email",
            FieldType::Url(_) => "url",
            FieldType::Editor(_) => "editor",
            FieldType::Date(_) => "date",
            FieldType::Select(_) => "select",
            FieldType::Json(_) => "json",
            FieldType::File(_) => "file",
            FieldType::Relation(_) => "relation",
        }
    }

    /// Whether both types are the same variant, ignoring options
    pub fn same_variant(&self, other: &FieldType) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    fn from_parts(type_name: &str, options: Value) -> Result<Self, String> {
        // A missing options object means "all defaults"
        let options = if options.is_null() {
            Value::Object(Default::default())
        } else {
            options
        };
        let parse_err = |e: serde_json::Error| format!("invalid {} options: {}", type_name, e);

        let field_type = match type_name {
            "text" => FieldType::Text(serde_json::from_value(options).map_err(parse_err)?),
            "number" => FieldType::Number(serde_json::from_value(options).map_err(parse_err)?),
            "bool" => FieldType::Bool,
            "email" => FieldType::Email(serde_json::from_value(options).map_err(parse_err)?),
            "url" => FieldType::Url(serde_json::from_value(options).map_err(parse_err)?),
            "editor" => FieldType::Editor(serde_json::from_value(options).map_err(parse_err)?),
            "date" => FieldType::Date(serde_json::from_value(options).map_err(parse_err)?),
            "select" => FieldType::Select(serde_json::from_value(options).map_err(parse_err)?),
            "json" => FieldType::Json(serde_json::from_value(options).map_err(parse_err)?),
            "file" => FieldType::File(serde_json::from_value(options).map_err(parse_err)?),
            "relation" => {
                FieldType::Relation(serde_json::from_value(options).map_err(parse_err)?)
            }
            other => return Err(format!("unknown field type '{}'", other)),
        };
        Ok(field_type)
    }

    fn options_value(&self) -> Value {
        let value = match self {
            FieldType::Text(o) => serde_json::to_value(o),
            FieldType::Number(o) => serde_json::to_value(o),
            FieldType::Bool => return Value::Object(Default::default()),
            FieldType::Email(o) | FieldType::Url(o) => serde_json::to_value(o),
            FieldType::Editor(o) => serde_json::to_value(o),
            FieldType::Date(o) => serde_json::to_value(o),
            FieldType::Select(o) => serde_json::to_value(o),
            FieldType::Json(o) => serde_json::to_value(o),
            FieldType::File(o) => serde_json::to_value(o),
            FieldType::Relation(o) => serde_json::to_value(o),
        };
        // Option structs only hold plain data, serialization cannot fail
        value.unwrap_or(Value::Null)
    }

    fn lint(&self) -> Vec<String> {
        let mut issues = Vec::new();
        match self {
            FieldType::Text(o) => {
                if let (Some(min), Some(max)) = (o.min, o.max) {
                    if min > max {
                        issues.push(format!("min ({}) cannot exceed max ({})", min, max));
                    }
                }
                if !o.pattern.is_empty() && Regex::new(&o.pattern).is_err() {
                    issues.push(format!("pattern '{}' is not a valid regex", o.pattern));
                }
            }
            FieldType::Number(o) => {
                if let (Some(min), Some(max)) = (o.min, o.max) {
                    if min > max {
                        issues.push(format!("min ({}) cannot exceed max ({})", min, max));
                    }
                }
            }
            FieldType::Select(o) => {
                if o.values.is_empty() {
                    issues.push("select needs at least one value".to_string());
                }
                let mut seen = std::collections::HashSet::new();
                for v in &o.values {
                    if !seen.insert(v.as_str()) {
                        issues.push(format!("duplicate select value '{}'", v));
                    }
                }
                if o.max_select == 0 || o.max_select as usize > o.values.len().max(1) {
                    issues.push(format!(
                        "maxSelect must be between 1 and the number of values (got {})",
                        o.max_select
                    ));
                }
            }
            FieldType::File(o) => {
                if o.max_select == 0 {
                    issues.push("maxSelect must be at least 1".to_string());
                }
                if o.max_size == 0 {
                    issues.push("maxSize must be at least 1 byte".to_string());
                }
            }
            FieldType::Relation(o) => {
                if o.collection_id.trim().is_empty() {
                    issues.push("relation collectionId must be set".to_string());
                }
                if o.max_select == Some(0) {
                    issues.push("relation maxSelect must be at least 1".to_string());
                }
                if let (Some(min), Some(max)) = (o.min_select, o.max_select) {
                    if min > max {
                        issues.push(format!("minSelect ({}) cannot exceed maxSelect ({})", min, max));
                    }
                }
            }
            FieldType::Bool
            | FieldType::Email(_)
            | FieldType::Url(_)
            | FieldType::Editor(_)
            | FieldType::Date(_)
            | FieldType::Json(_) => {}
        }
        issues
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextOptions {
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub pattern: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NumberOptions {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub no_decimal: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DomainOptions {
    pub except_domains: Option<Vec<String>>,
    pub only_domains: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorOptions {
    pub convert_urls: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DateOptions {
    pub min: Option<String>,
    pub max: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectOptions {
    pub max_select: u32,
    pub values: Vec<String>,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            max_select: 1,
            values: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JsonOptions {
    pub max_size: u64,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self { max_size: 2_000_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileOptions {
    pub mime_types: Vec<String>,
    pub thumbs: Vec<String>,
    pub max_select: u32,
    pub max_size: u64,
    pub protected: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            mime_types: Vec::new(),
            thumbs: Vec::new(),
            max_select: 1,
            max_size: 5_242_880,
            protected: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelationOptions {
    /// Target collection id (never its name)
    pub collection_id: String,
    pub cascade_delete: bool,
    pub min_select: Option<u32>,
    pub max_select: Option<u32>,
    pub display_fields: Option<Vec<String>>,
}

/// Wire representation of a field.
#[derive(Serialize, Deserialize)]
struct RawField {
    #[serde(default)]
    id: String,
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    presentable: bool,
    #[serde(default)]
    system: bool,
    #[serde(default)]
    options: Value,
}

impl TryFrom<RawField> for FieldDefinition {
    type Error = String;

    fn try_from(raw: RawField) -> Result<Self, Self::Error> {
        let field_type = FieldType::from_parts(&raw.field_type, raw.options)
            .map_err(|e| format!("field '{}': {}", raw.name, e))?;
        Ok(Self {
            id: raw.id,
            name: raw.name,
            field_type,
            required: raw.required,
            unique: raw.unique,
            presentable: raw.presentable,
            system: raw.system,
        })
    }
}

impl From<FieldDefinition> for RawField {
    fn from(field: FieldDefinition) -> Self {
        Self {
            options: field.field_type.options_value(),
            field_type: field.field_type.type_name().to_string(),
            id: field.id,
            name: field.name,
            required: field.required,
            unique: field.unique,
            presentable: field.presentable,
            system: field.system,
        }
    }
}
