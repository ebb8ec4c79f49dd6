use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::field::{identifier_pattern, FieldDefinition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDefinition {
    /// Stable identity, the target of relation fields. Empty until saved.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: CollectionKind,
    /// System collections cannot be deleted
    #[serde(default)]
    pub system: bool,
    #[serde(default, alias = "schema")]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
    #[serde(flatten)]
    pub rules: RuleSet,
    /// Source query of a view collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_query: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    #[default]
    Base,
    #[serde(alias = "authable")]
    Auth,
    View,
}

impl CollectionKind {
    /// Fields implicitly present on every collection of this kind
    pub fn system_fields(&self) -> &'static [&'static str] {
        match self {
            CollectionKind::Base => &["id", "created", "updated"],
            CollectionKind::Auth => &[
                "id",
                "created",
                "updated",
                "username",
                "email",
                "emailVisibility",
                "verified",
            ],
            CollectionKind::View => &["id"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Base => "base",
            CollectionKind::Auth => "auth",
            CollectionKind::View => "view",
        }
    }
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization rules for the five record operations.
///
/// `None` is the superuser-only marker. `Some` holds the rule text exactly as
/// written; it is never parsed here (an empty string is a valid rule).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleSet {
    pub list_rule: Option<String>,
    pub view_rule: Option<String>,
    pub create_rule: Option<String>,
    pub update_rule: Option<String>,
    pub delete_rule: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    List,
    View,
    Create,
    Update,
    Delete,
}

impl RuleAction {
    pub const ALL: [RuleAction; 5] = [
        RuleAction::List,
        RuleAction::View,
        RuleAction::Create,
        RuleAction::Update,
        RuleAction::Delete,
    ];
}

impl RuleSet {
    /// Same rule for every action
    pub fn uniform(rule: Option<&str>) -> Self {
        let rule = rule.map(str::to_string);
        Self {
            list_rule: rule.clone(),
            view_rule: rule.clone(),
            create_rule: rule.clone(),
            update_rule: rule.clone(),
            delete_rule: rule,
        }
    }

    pub fn get(&self, action: RuleAction) -> Option<&str> {
        self.slot(action).as_deref()
    }

    /// Replace the rule for `action`, returning the previous one
    pub fn set(&mut self, action: RuleAction, rule: Option<String>) -> Option<String> {
        std::mem::replace(self.slot_mut(action), rule)
    }

    fn slot(&self, action: RuleAction) -> &Option<String> {
        match action {
            RuleAction::List => &self.list_rule,
            RuleAction::View => &self.view_rule,
            RuleAction::Create => &self.create_rule,
            RuleAction::Update => &self.update_rule,
            RuleAction::Delete => &self.delete_rule,
        }
    }

    fn slot_mut(&mut self, action: RuleAction) -> &mut Option<String> {
        match action {
            RuleAction::List => &mut self.list_rule,
            RuleAction::View => &mut self.view_rule,
            RuleAction::Create => &mut self.create_rule,
            RuleAction::Update => &mut self.update_rule,
            RuleAction::Delete => &mut self.delete_rule,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

impl CollectionDefinition {
    pub fn new(name: impl Into<String>, kind: CollectionKind) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            kind,
            system: false,
            fields: Vec::new(),
            indexes: Vec::new(),
            rules: RuleSet::default(),
            view_query: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.add_field(field);
        self
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// Look up a field by id first, then by name (case-insensitive)
    pub fn field(&self, id_or_name: &str) -> Option<&FieldDefinition> {
        self.position(id_or_name).map(|i| &self.fields[i])
    }

    pub fn field_mut(&mut self, id_or_name: &str) -> Option<&mut FieldDefinition> {
        let i = self.position(id_or_name)?;
        Some(&mut self.fields[i])
    }

    /// Add a field, replacing an existing field with the same id in place.
    /// Fields without an id are appended.
    pub fn add_field(&mut self, field: FieldDefinition) {
        let existing = if field.id.is_empty() {
            None
        } else {
            self.fields.iter().position(|f| f.id == field.id)
        };
        match existing {
            Some(i) => self.fields[i] = field,
            None => self.fields.push(field),
        }
    }

    pub fn remove_field(&mut self, id_or_name: &str) -> Option<FieldDefinition> {
        self.position(id_or_name).map(|i| self.fields.remove(i))
    }

    /// Names of all fields, system fields first
    pub fn field_names(&self) -> Vec<&str> {
        self.kind
            .system_fields()
            .iter()
            .copied()
            .chain(self.fields.iter().map(|f| f.name.as_str()))
            .collect()
    }

    /// Relation fields and the collection ids they target
    pub fn relations(&self) -> impl Iterator<Item = (&FieldDefinition, &str)> {
        self.fields
            .iter()
            .filter_map(|f| f.relation().map(|r| (f, r.collection_id.as_str())))
    }

    fn position(&self, id_or_name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| !f.id.is_empty() && f.id == id_or_name)
            .or_else(|| {
                self.fields
                    .iter()
                    .position(|f| f.name.eq_ignore_ascii_case(id_or_name))
            })
    }

    /// Structural issues that need no other collection to detect (empty = ok)
    pub fn lint(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !identifier_pattern().is_match(&self.name) {
            issues.push(format!(
                "collection name '{}' must be non-empty and contain only letters, digits and underscores",
                self.name
            ));
        }
        if !self.id.is_empty() && !identifier_pattern().is_match(&self.id) {
            issues.push(format!("collection id '{}' is invalid", self.id));
        }

        let system_fields = self.kind.system_fields();
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for field in &self.fields {
            issues.extend(field.lint());
            if !field.id.is_empty() && !ids.insert(field.id.as_str()) {
                issues.push(format!("duplicate field id '{}'", field.id));
            }
            if !names.insert(field.name.to_lowercase()) {
                issues.push(format!("duplicate field name '{}'", field.name));
            }
            if system_fields
                .iter()
                .any(|s| s.eq_ignore_ascii_case(&field.name))
            {
                issues.push(format!(
                    "field name '{}' is reserved for {} collections",
                    field.name, self.kind
                ));
            }
        }

        let known: HashSet<String> = self
            .field_names()
            .into_iter()
            .map(str::to_lowercase)
            .collect();
        let mut index_names = HashSet::new();
        for index in &self.indexes {
            if index.name.trim().is_empty() {
                issues.push("index name must be set".to_string());
            } else if !index_names.insert(index.name.to_lowercase()) {
                issues.push(format!("duplicate index name '{}'", index.name));
            }
            if index.columns.is_empty() {
                issues.push(format!("index '{}' has no columns", index.name));
            }
            for column in &index.columns {
                if !known.contains(&column.to_lowercase()) {
                    issues.push(format!(
                        "index '{}' references unknown field '{}'",
                        index.name, column
                    ));
                }
            }
        }

        match (self.kind, self.view_query.as_deref()) {
            (CollectionKind::View, None) => {
                issues.push("view collections need a viewQuery".to_string())
            }
            (CollectionKind::View, Some(q)) if q.trim().is_empty() => {
                issues.push("view collections need a viewQuery".to_string())
            }
            (CollectionKind::Base | CollectionKind::Auth, Some(_)) => {
                issues.push(format!("{} collections cannot have a viewQuery", self.kind))
            }
            _ => {}
        }

        issues
    }
}
