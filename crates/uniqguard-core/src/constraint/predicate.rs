//! Declarative condition tree attached to a constraint descriptor.
//!
//! The same tree is evaluated in memory against candidate rows and translated
//! into storage-level filters, so it carries no reference to any query builder.

use std::collections::BTreeSet;
use std::fmt;

use super::Value;

/// Comparison operator of a predicate leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// `field = value`
    Eq(Value),
    /// `field <> value`
    Ne(Value),
    /// `field < value`
    Lt(Value),
    /// `field <= value`
    Le(Value),
    /// `field > value`
    Gt(Value),
    /// `field >= value`
    Ge(Value),
    /// `field IN (values)`
    In(Vec<Value>),
    /// `field IS NULL` when true, `field IS NOT NULL` when false.
    IsNull(bool),
}

/// A single field comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Field the comparison reads.
    pub field: String,
    /// Operator and literal operand.
    pub op: Operator,
}

/// Boolean predicate over the fields of one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// A field comparison.
    Leaf(Comparison),
    /// All children hold.
    And(Vec<Predicate>),
    /// At least one child holds.
    Or(Vec<Predicate>),
    /// The child does not hold.
    Not(Box<Predicate>),
}

impl Predicate {
    /// Build a comparison leaf.
    pub fn leaf(field: impl Into<String>, op: Operator) -> Self {
        Predicate::Leaf(Comparison {
            field: field.into(),
            op,
        })
    }

    /// `field = value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field, Operator::Eq(value.into()))
    }

    /// `field <> value`
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field, Operator::Ne(value.into()))
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field, Operator::Lt(value.into()))
    }

    /// `field <= value`
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field, Operator::Le(value.into()))
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field, Operator::Gt(value.into()))
    }

    /// `field >= value`
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field, Operator::Ge(value.into()))
    }

    /// `field IN (values)`
    pub fn is_in(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self::leaf(field, Operator::In(values.into_iter().map(Into::into).collect()))
    }

    /// `field IS NULL`
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::leaf(field, Operator::IsNull(true))
    }

    /// `field IS NOT NULL`
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::leaf(field, Operator::IsNull(false))
    }

    /// Conjunction of this predicate and `other`, flattening nested ANDs.
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), right) => {
                left.push(right);
                Predicate::And(left)
            }
            (left, right) => Predicate::And(vec![left, right]),
        }
    }

    /// Disjunction of this predicate and `other`, flattening nested ORs.
    pub fn or(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::Or(mut left), Predicate::Or(right)) => {
                left.extend(right);
                Predicate::Or(left)
            }
            (Predicate::Or(mut left), right) => {
                left.push(right);
                Predicate::Or(left)
            }
            (left, right) => Predicate::Or(vec![left, right]),
        }
    }

    /// Negation of this predicate.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// All field names referenced anywhere in the tree, sorted.
    pub fn fields(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Predicate::Leaf(cmp) => {
                out.insert(cmp.field.as_str());
            }
            Predicate::And(children) | Predicate::Or(children) => {
                for child in children {
                    child.collect_fields(out);
                }
            }
            Predicate::Not(child) => child.collect_fields(out),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Eq(v) => write!(f, "= {}", v),
            Operator::Ne(v) => write!(f, "<> {}", v),
            Operator::Lt(v) => write!(f, "< {}", v),
            Operator::Le(v) => write!(f, "<= {}", v),
            Operator::Gt(v) => write!(f, "> {}", v),
            Operator::Ge(v) => write!(f, ">= {}", v),
            Operator::In(values) => {
                let items: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "IN ({})", items.join(", "))
            }
            Operator::IsNull(true) => f.write_str("IS NULL"),
            Operator::IsNull(false) => f.write_str("IS NOT NULL"),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Leaf(cmp) => write!(f, "{} {}", cmp.field, cmp.op),
            Predicate::And(children) => write_joined(f, children, " AND "),
            Predicate::Or(children) => write_joined(f, children, " OR "),
            Predicate::Not(child) => write!(f, "NOT ({})", child),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Predicate], sep: &str) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        match child {
            Predicate::Leaf(_) | Predicate::Not(_) => write!(f, "{}", child)?,
            _ => write!(f, "({})", child)?,
        }
    }
    Ok(())
}
