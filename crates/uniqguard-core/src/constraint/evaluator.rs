//! In-memory evaluation of constraint conditions against candidate rows.
//!
//! Evaluation never touches storage. Comparison semantics follow SQL: any
//! comparison with a null operand is false, only `IS NULL` observes nulls.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::EvaluationError;

use super::{Comparison, Operator, Predicate, Value};

/// Evaluates predicate trees against a row's field values.
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Does the row fall within the scope of `predicate`?
    pub fn evaluate(
        predicate: &Predicate,
        row: &HashMap<String, Value>,
    ) -> Result<bool, EvaluationError> {
        match predicate {
            Predicate::Leaf(cmp) => Self::evaluate_leaf(cmp, row),
            Predicate::And(children) => {
                for child in children {
                    if !Self::evaluate(child, row)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or(children) => {
                for child in children {
                    if Self::evaluate(child, row)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not(child) => Ok(!Self::evaluate(child, row)?),
        }
    }

    fn evaluate_leaf(cmp: &Comparison, row: &HashMap<String, Value>) -> Result<bool, EvaluationError> {
        let value = row
            .get(&cmp.field)
            .ok_or_else(|| EvaluationError::UnknownField(cmp.field.clone()))?;

        match &cmp.op {
            Operator::IsNull(expected) => Ok(value.is_null() == *expected),
            _ if value.is_null() => Ok(false),
            Operator::Eq(lit) => Ok(value.key_eq(lit)),
            Operator::Ne(lit) => Ok(!lit.is_null() && !value.key_eq(lit)),
            Operator::Lt(lit) => Self::order(value, lit, Ordering::is_lt),
            Operator::Le(lit) => Self::order(value, lit, Ordering::is_le),
            Operator::Gt(lit) => Self::order(value, lit, Ordering::is_gt),
            Operator::Ge(lit) => Self::order(value, lit, Ordering::is_ge),
            Operator::In(items) => Ok(items.iter().any(|item| value.key_eq(item))),
        }
    }

    fn order(
        value: &Value,
        literal: &Value,
        predicate: fn(Ordering) -> bool,
    ) -> Result<bool, EvaluationError> {
        if literal.is_null() {
            return Ok(false);
        }
        match value.compare(literal) {
            Some(ord) => Ok(predicate(ord)),
            None => Err(EvaluationError::TypeMismatch {
                left_type: value.type_name().to_string(),
                right_type: literal.type_name().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_data(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn eval(p: &Predicate, data: &HashMap<String, Value>) -> bool {
        ConditionEvaluator::evaluate(p, data).unwrap()
    }

    #[test]
    fn test_simple_comparison() {
        let data = make_data(vec![("age", Value::Int(25))]);

        assert!(eval(&Predicate::ge("age", 18), &data));
        assert!(eval(&Predicate::gt("age", 20), &data));
        assert!(eval(&Predicate::lt("age", 30), &data));
        assert!(eval(&Predicate::le("age", 25), &data));
        assert!(eval(&Predicate::eq("age", 25), &data));
        assert!(!eval(&Predicate::ge("age", 30), &data));
        assert!(eval(&Predicate::ne("age", 30), &data));
    }

    #[test]
    fn test_string_comparison() {
        let data = make_data(vec![("status", Value::from("active"))]);

        assert!(eval(&Predicate::eq("status", "active"), &data));
        assert!(!eval(&Predicate::eq("status", "inactive"), &data));
        assert!(eval(&Predicate::lt("status", "b"), &data));
    }

    #[test]
    fn test_is_null() {
        let data = make_data(vec![
            ("email", Value::from("test@example.com")),
            ("middle_name", Value::Null),
        ]);

        assert!(eval(&Predicate::is_not_null("email"), &data));
        assert!(!eval(&Predicate::is_null("email"), &data));
        assert!(eval(&Predicate::is_null("middle_name"), &data));
        assert!(!eval(&Predicate::is_not_null("middle_name"), &data));
    }

    #[test]
    fn test_null_comparison() {
        let data = make_data(vec![("value", Value::Null)]);

        assert!(!eval(&Predicate::eq("value", 0), &data));
        assert!(!eval(&Predicate::ne("value", 0), &data));
        assert!(!eval(&Predicate::gt("value", 0), &data));
        assert!(!eval(&Predicate::is_in("value", [0, 1]), &data));
        // NOT over a null comparison is true, as with `NOT (x = 0)` in memory.
        assert!(eval(&Predicate::eq("value", 0).not(), &data));
    }

    #[test]
    fn test_in_clause() {
        let data = make_data(vec![("status", Value::from("active"))]);

        assert!(eval(&Predicate::is_in("status", ["active", "pending"]), &data));
        assert!(!eval(&Predicate::is_in("status", ["archived", "deleted"]), &data));
    }

    #[test]
    fn test_and_or_not() {
        let data = make_data(vec![
            ("age", Value::Int(25)),
            ("status", Value::from("active")),
        ]);

        let adult = Predicate::ge("age", 18);
        let senior = Predicate::ge("age", 65);
        let active = Predicate::eq("status", "active");

        assert!(eval(&adult.clone().and(active.clone()), &data));
        assert!(!eval(&senior.clone().and(active.clone()), &data));
        assert!(eval(&senior.clone().or(active.clone()), &data));
        assert!(!eval(&senior.clone().or(Predicate::eq("status", "x")), &data));
        assert!(eval(&senior.not(), &data));
        assert!(eval(&Predicate::And(vec![]), &data));
        assert!(!eval(&Predicate::Or(vec![]), &data));
    }

    #[test]
    fn test_short_circuit_skips_missing_fields() {
        let data = make_data(vec![("is_active", Value::Bool(false))]);

        // The second branch references an absent field but is never reached.
        let p = Predicate::eq("is_active", true).and(Predicate::eq("missing", 1));
        assert!(!eval(&p, &data));
    }

    #[test]
    fn test_float_comparison() {
        let data = make_data(vec![("amount", Value::Float(10.5))]);

        assert!(eval(&Predicate::gt("amount", 10), &data));
        assert!(eval(&Predicate::lt("amount", 11), &data));
        assert!(eval(&Predicate::ge("amount", 10.5), &data));
        assert!(eval(&Predicate::is_in("amount", [10.5]), &data));
    }

    #[test]
    fn test_unknown_field() {
        let data = make_data(vec![]);

        let result = ConditionEvaluator::evaluate(&Predicate::gt("unknown_field", 0), &data);
        assert_eq!(
            result,
            Err(EvaluationError::UnknownField("unknown_field".into()))
        );
    }

    #[test]
    fn test_type_mismatch() {
        let data = make_data(vec![("age", Value::from("old"))]);

        assert!(matches!(
            ConditionEvaluator::evaluate(&Predicate::gt("age", 10), &data),
            Err(EvaluationError::TypeMismatch { .. })
        ));
        // Equality across types is simply false.
        assert!(!eval(&Predicate::eq("age", 10), &data));
    }
}
