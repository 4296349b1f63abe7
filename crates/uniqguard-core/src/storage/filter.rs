//! Storage-level row filters.
//!
//! A conflict lookup is translated once into a [`RowFilter`] and the filter
//! is then matched against every stored record of the entity. Stored data
//! never raises: a missing column reads as null and an ordering between
//! incompatible types simply does not match.

use std::cmp::Ordering;

use super::Record;
use crate::constraint::{ConflictLookup, Operator, Predicate, Value};

/// Filter over stored records.
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    /// `field = value`
    Eq {
        /// Column name.
        field: String,
        /// Literal.
        value: Value,
    },
    /// `field <> value`
    Ne {
        /// Column name.
        field: String,
        /// Literal.
        value: Value,
    },
    /// Ordering comparison; matches when the column's ordering against the
    /// literal is one of `accept`.
    Cmp {
        /// Column name.
        field: String,
        /// Literal.
        value: Value,
        /// Accepted orderings.
        accept: &'static [Ordering],
    },
    /// `field IN (values)`
    In {
        /// Column name.
        field: String,
        /// Literals.
        values: Vec<Value>,
    },
    /// `field IS NULL` / `field IS NOT NULL`
    IsNull {
        /// Column name.
        field: String,
        /// Whether null is expected.
        null: bool,
    },
    /// All children match.
    And(Vec<RowFilter>),
    /// Any child matches.
    Or(Vec<RowFilter>),
    /// Child does not match.
    Not(Box<RowFilter>),
}

const LT: &[Ordering] = &[Ordering::Less];
const LE: &[Ordering] = &[Ordering::Less, Ordering::Equal];
const GT: &[Ordering] = &[Ordering::Greater];
const GE: &[Ordering] = &[Ordering::Greater, Ordering::Equal];

impl RowFilter {
    /// Translate a predicate tree.
    pub fn from_predicate(predicate: &Predicate) -> Self {
        match predicate {
            Predicate::Leaf(cmp) => {
                let field = cmp.field.clone();
                let ordered = |value: &Value, accept| RowFilter::Cmp {
                    field: cmp.field.clone(),
                    value: value.clone(),
                    accept,
                };
                match &cmp.op {
                    Operator::Eq(value) => RowFilter::Eq {
                        field,
                        value: value.clone(),
                    },
                    Operator::Ne(value) => RowFilter::Ne {
                        field,
                        value: value.clone(),
                    },
                    Operator::Lt(value) => ordered(value, LT),
                    Operator::Le(value) => ordered(value, LE),
                    Operator::Gt(value) => ordered(value, GT),
                    Operator::Ge(value) => ordered(value, GE),
                    Operator::In(values) => RowFilter::In {
                        field,
                        values: values.clone(),
                    },
                    Operator::IsNull(null) => RowFilter::IsNull { field, null: *null },
                }
            }
            Predicate::And(children) => {
                RowFilter::And(children.iter().map(Self::from_predicate).collect())
            }
            Predicate::Or(children) => {
                RowFilter::Or(children.iter().map(Self::from_predicate).collect())
            }
            Predicate::Not(child) => RowFilter::Not(Box::new(Self::from_predicate(child))),
        }
    }

    /// Translate a conflict lookup: key equalities AND the scope condition.
    pub fn from_lookup(lookup: &ConflictLookup<'_>) -> Self {
        let mut filters: Vec<RowFilter> = lookup
            .equals
            .iter()
            .map(|(field, value)| RowFilter::Eq {
                field: field.to_string(),
                value: (*value).clone(),
            })
            .collect();
        if let Some(condition) = lookup.condition {
            filters.push(Self::from_predicate(condition));
        }
        RowFilter::And(filters)
    }

    /// Whether a stored record matches.
    pub fn matches(&self, record: &Record) -> bool {
        let column = |field: &str| record.get(field).unwrap_or(&Value::Null);
        match self {
            RowFilter::Eq { field, value } => column(field).key_eq(value),
            RowFilter::Ne { field, value } => {
                let stored = column(field);
                !stored.is_null() && !value.is_null() && !stored.key_eq(value)
            }
            RowFilter::Cmp {
                field,
                value,
                accept,
            } => column(field)
                .compare(value)
                .is_some_and(|ord| accept.contains(&ord)),
            RowFilter::In { field, values } => {
                let stored = column(field);
                values.iter().any(|v| stored.key_eq(v))
            }
            RowFilter::IsNull { field, null } => column(field).is_null() == *null,
            RowFilter::And(filters) => filters.iter().all(|f| f.matches(record)),
            RowFilter::Or(filters) => filters.iter().any(|f| f.matches(record)),
            RowFilter::Not(filter) => !filter.matches(record),
        }
    }
}
