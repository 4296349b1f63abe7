//! Unique constraint declarations, as written in model metadata.

use serde::{Deserialize, Serialize};

use crate::constraint::Value;

/// A named, optionally conditional, unique declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueDecl {
    /// Constraint name.
    pub name: String,
    /// Fields that must be unique together.
    pub fields: Vec<String>,
    /// Rows outside this condition do not participate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionDecl>,
}

/// Declared condition, before extraction turns it into a predicate tree.
///
/// Lookup keys follow the `field` / `field__op` convention; supported ops are
/// `exact`, `gt`, `gte`, `lt`, `lte`, `in` and `isnull`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionDecl {
    /// `key = value` in lookup form, e.g. `{"key": "age__gte", "value": 18}`.
    Lookup {
        /// Lookup key.
        key: String,
        /// Literal operand; a list for `in`.
        value: LookupValue,
    },
    /// Textual form, e.g. `"is_active = true AND status IN ('a', 'b')"`.
    Expression(String),
    /// All children hold.
    And(Vec<ConditionDecl>),
    /// Any child holds.
    Or(Vec<ConditionDecl>),
    /// Child does not hold.
    Not(Box<ConditionDecl>),
}

/// Literal operand of a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LookupValue {
    /// A single scalar.
    Scalar(Value),
    /// A list, for `in`.
    List(Vec<Value>),
}

impl UniqueDecl {
    /// Create an unconditional declaration.
    pub fn new(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            condition: None,
        }
    }

    /// Attach a condition.
    pub fn with_condition(mut self, condition: ConditionDecl) -> Self {
        self.condition = Some(condition);
        self
    }
}

impl ConditionDecl {
    /// Lookup leaf with a scalar operand.
    pub fn lookup(key: impl Into<String>, value: impl Into<Value>) -> Self {
        ConditionDecl::Lookup {
            key: key.into(),
            value: LookupValue::Scalar(value.into()),
        }
    }

    /// Lookup leaf with a list operand.
    pub fn lookup_in(
        key: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        ConditionDecl::Lookup {
            key: key.into(),
            value: LookupValue::List(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Textual condition.
    pub fn expression(text: impl Into<String>) -> Self {
        ConditionDecl::Expression(text.into())
    }

    /// Negate this condition.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        ConditionDecl::Not(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let decl: UniqueDecl = serde_json::from_str(
            r#"{
                "name": "unique_active_author_email",
                "fields": ["email"],
                "condition": {"and": [
                    {"lookup": {"key": "is_active", "value": true}},
                    {"not": {"lookup": {"key": "status__in", "value": ["banned", "spam"]}}},
                    {"expression": "age >= 18"}
                ]}
            }"#,
        )
        .unwrap();

        let expected = UniqueDecl::new("unique_active_author_email", ["email"]).with_condition(
            ConditionDecl::And(vec![
                ConditionDecl::lookup("is_active", true),
                ConditionDecl::lookup_in("status__in", ["banned", "spam"]).not(),
                ConditionDecl::expression("age >= 18"),
            ]),
        );
        assert_eq!(decl, expected);
    }
}
