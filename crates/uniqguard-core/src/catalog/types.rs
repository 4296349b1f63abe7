//! Field type definitions for the catalog.

use serde::{Deserialize, Serialize};

use crate::constraint::Value;

/// Scalar data types a model field can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// Fixed-precision decimal.
    Decimal {
        /// Total number of digits.
        precision: u8,
        /// Number of digits after decimal point.
        scale: u8,
    },
    /// UTF-8 string.
    String,
    /// Binary data.
    Bytes,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// UUID (128-bit identifier), written as text.
    Uuid,
}

/// Field types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// A scalar value.
    Scalar(ScalarType),
    /// An optional scalar value (nullable).
    OptionalScalar(ScalarType),
    /// An enumeration type.
    Enum {
        /// Name of the enum type.
        name: String,
        /// Allowed variant values.
        variants: Vec<String>,
    },
    /// An optional enumeration.
    OptionalEnum {
        /// Name of the enum type.
        name: String,
        /// Allowed variant values.
        variants: Vec<String>,
    },
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarType::Int32
                | ScalarType::Int64
                | ScalarType::Float32
                | ScalarType::Float64
                | ScalarType::Decimal { .. }
        )
    }

    /// Check if this type is a string-like type.
    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            ScalarType::String | ScalarType::Bytes | ScalarType::Uuid
        )
    }

    fn accepts(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Bool(_) => matches!(self, ScalarType::Bool),
            Value::Int(_) => self.is_numeric() || matches!(self, ScalarType::Timestamp),
            Value::Float(_) => matches!(
                self,
                ScalarType::Float32 | ScalarType::Float64 | ScalarType::Decimal { .. }
            ),
            Value::String(_) => {
                self.is_string_like()
                    || matches!(self, ScalarType::Timestamp | ScalarType::Decimal { .. })
            }
        }
    }
}

impl FieldType {
    /// Create a scalar field type.
    pub fn scalar(scalar: ScalarType) -> Self {
        FieldType::Scalar(scalar)
    }

    /// Create an optional scalar field type.
    pub fn optional_scalar(scalar: ScalarType) -> Self {
        FieldType::OptionalScalar(scalar)
    }

    /// Create an enum field type.
    pub fn enum_type(name: impl Into<String>, variants: Vec<String>) -> Self {
        FieldType::Enum {
            name: name.into(),
            variants,
        }
    }

    /// Check if this type is nullable.
    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            FieldType::OptionalScalar(_) | FieldType::OptionalEnum { .. }
        )
    }

    /// Get the inner scalar type if this is a scalar-based type.
    pub fn scalar_type(&self) -> Option<&ScalarType> {
        match self {
            FieldType::Scalar(s) | FieldType::OptionalScalar(s) => Some(s),
            _ => None,
        }
    }

    /// Whether a literal of this shape can be compared against the field.
    ///
    /// Enum fields only accept their declared variants.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::Scalar(s) | FieldType::OptionalScalar(s) => s.accepts(value),
            FieldType::Enum { variants, .. } | FieldType::OptionalEnum { variants, .. } => {
                match value {
                    Value::Null => true,
                    Value::String(s) => variants.iter().any(|v| v == s),
                    _ => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_type_checks() {
        assert!(ScalarType::Int32.is_numeric());
        assert!(ScalarType::Decimal {
            precision: 10,
            scale: 2
        }
        .is_numeric());
        assert!(!ScalarType::String.is_numeric());
        assert!(ScalarType::Uuid.is_string_like());
        assert!(!ScalarType::Int32.is_string_like());
    }

    #[test]
    fn test_accepts_literals() {
        let flag = FieldType::scalar(ScalarType::Bool);
        assert!(flag.accepts(&Value::Bool(true)));
        assert!(!flag.accepts(&Value::Int(1)));

        let amount = FieldType::optional_scalar(ScalarType::Float64);
        assert!(amount.accepts(&Value::Int(3)));
        assert!(amount.accepts(&Value::Null));
        assert!(!amount.accepts(&Value::from("3")));
    }

    #[test]
    fn test_enum_accepts_variants_only() {
        let status = FieldType::enum_type("Status", vec!["active".into(), "archived".into()]);
        assert!(!status.is_nullable());
        assert!(status.accepts(&Value::from("active")));
        assert!(!status.accepts(&Value::from("deleted")));
        assert!(!status.accepts(&Value::Int(0)));
    }

    #[test]
    fn test_json_shape() {
        let ty: FieldType = serde_json::from_str(r#"{"optional_scalar": "string"}"#).unwrap();
        assert_eq!(ty, FieldType::OptionalScalar(ScalarType::String));
        assert!(ty.is_nullable());
    }
}
