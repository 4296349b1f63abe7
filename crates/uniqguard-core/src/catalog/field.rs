//! Field definitions for entities.

use serde::{Deserialize, Serialize};

use super::types::FieldType;

/// A field definition within an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field data type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Storage column name, when it differs from the field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl FieldDef {
    /// Create a new field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            column: None,
        }
    }

    /// Create an optional scalar field.
    pub fn optional_scalar(name: impl Into<String>, scalar: crate::catalog::ScalarType) -> Self {
        Self::new(name, FieldType::OptionalScalar(scalar))
    }

    /// Override the storage column name.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Column name used by storage-level queries.
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    /// Check if the field may hold null.
    pub fn is_nullable(&self) -> bool {
        self.field_type.is_nullable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::ScalarType;

    #[test]
    fn test_field_def_builder() {
        let field = FieldDef::new("email", FieldType::scalar(ScalarType::String))
            .with_column("email_address");

        assert_eq!(field.name, "email");
        assert_eq!(field.column_name(), "email_address");
        assert!(!field.is_nullable());
    }

    #[test]
    fn test_optional_field() {
        let field = FieldDef::optional_scalar("deleted_at", ScalarType::Timestamp);

        assert!(field.is_nullable());
        assert_eq!(field.column_name(), "deleted_at");
    }
}
