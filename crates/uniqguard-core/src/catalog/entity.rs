//! Entity definitions.

use serde::{Deserialize, Serialize};

use super::declaration::UniqueDecl;
use super::field::FieldDef;

fn default_identity() -> String {
    "id".to_string()
}

/// An entity definition (model metadata).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name (unique within schema).
    pub name: String,
    /// Model group the entity belongs to; used for exclusion.
    pub app: String,
    /// Storage table name; defaults to `{app}_{name}` in lower case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Name of the primary identity field.
    #[serde(default = "default_identity")]
    pub identity_field: String,
    /// Field definitions.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Compound unique field tuples.
    #[serde(default)]
    pub unique_together: Vec<Vec<String>>,
    /// Named, optionally conditional, unique declarations.
    #[serde(default)]
    pub unique_constraints: Vec<UniqueDecl>,
    /// Abstract models own no rows.
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Proxy models share the rows of another model.
    #[serde(default)]
    pub proxy: bool,
}

impl EntityDef {
    /// Create a new entity definition.
    pub fn new(app: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            app: app.into(),
            table: None,
            identity_field: default_identity(),
            fields: Vec::new(),
            unique_together: Vec::new(),
            unique_constraints: Vec::new(),
            is_abstract: false,
            proxy: false,
        }
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Set the identity field name.
    pub fn with_identity(mut self, field: impl Into<String>) -> Self {
        self.identity_field = field.into();
        self
    }

    /// Set an explicit table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Declare a compound unique field tuple.
    pub fn unique_together(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.unique_together
            .push(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Declare a named unique constraint.
    pub fn with_unique(mut self, decl: UniqueDecl) -> Self {
        self.unique_constraints.push(decl);
        self
    }

    /// Mark the entity abstract.
    pub fn abstract_model(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark the entity a proxy.
    pub fn proxy_model(mut self) -> Self {
        self.proxy = true;
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check whether a field exists, counting the identity field.
    pub fn has_field(&self, name: &str) -> bool {
        name == self.identity_field || self.get_field(name).is_some()
    }

    /// Whether the entity is a concrete persistable model.
    pub fn is_concrete(&self) -> bool {
        !self.is_abstract && !self.proxy
    }

    /// Whether the entity declares any uniqueness rule.
    pub fn has_unique_rules(&self) -> bool {
        !self.unique_together.is_empty() || !self.unique_constraints.is_empty()
    }

    /// Storage table name.
    pub fn table_name(&self) -> String {
        match &self.table {
            Some(table) => table.clone(),
            None => format!("{}_{}", self.app, self.name).to_lowercase(),
        }
    }

    /// Storage column for a field name; the identity field maps to itself.
    pub fn column_for<'a>(&'a self, field: &'a str) -> &'a str {
        self.get_field(field).map_or(field, FieldDef::column_name)
    }
}
