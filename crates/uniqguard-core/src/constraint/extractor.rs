//! Extraction of constraint descriptors from entity metadata.

use std::collections::HashSet;

use tracing::debug;

use crate::catalog::{ConditionDecl, EntityDef};
use crate::error::ExtractionError;

use super::parser::{self, ParseError};
use super::{ConstraintDescriptor, Operator, Predicate, Value};

/// Converts declared uniqueness rules into descriptors.
///
/// Extraction is pure: the same entity definition always yields the same
/// descriptors in the same order.
pub struct ConstraintExtractor;

impl ConstraintExtractor {
    /// Extract every uniqueness rule declared on `entity`.
    ///
    /// Compound field tuples come first, in declaration order, followed by the
    /// named declarations. A declaration whose name is already taken replaces
    /// the earlier descriptor in place.
    pub fn extract(entity: &EntityDef) -> Result<Vec<ConstraintDescriptor>, ExtractionError> {
        if !entity.is_concrete() {
            return Err(ExtractionError::NotConcrete {
                entity: entity.name.clone(),
            });
        }

        let mut descriptors: Vec<ConstraintDescriptor> = Vec::new();

        for fields in &entity.unique_together {
            let name = together_name(&entity.name, fields);
            let descriptor = Self::build(entity, &name, fields, None)?;
            push_or_replace(&mut descriptors, descriptor);
        }

        for decl in &entity.unique_constraints {
            let descriptor = Self::build(entity, &decl.name, &decl.fields, decl.condition.as_ref())?;
            push_or_replace(&mut descriptors, descriptor);
        }

        debug!(
            entity = %entity.name,
            count = descriptors.len(),
            "Extracted unique constraints"
        );

        Ok(descriptors)
    }

    fn build(
        entity: &EntityDef,
        name: &str,
        fields: &[String],
        condition: Option<&ConditionDecl>,
    ) -> Result<ConstraintDescriptor, ExtractionError> {
        let mut seen = HashSet::new();
        for field in fields {
            if !seen.insert(field.as_str()) {
                return Err(ExtractionError::DuplicateField {
                    entity: entity.name.clone(),
                    constraint: name.to_string(),
                    field: field.clone(),
                });
            }
            if !entity.has_field(field) {
                return Err(ExtractionError::UnknownField {
                    entity: entity.name.clone(),
                    constraint: name.to_string(),
                    field: field.clone(),
                });
            }
        }

        let descriptor = ConstraintDescriptor::new(name, &entity.name, fields.iter().cloned())
            .ok_or_else(|| ExtractionError::EmptyFields {
                entity: entity.name.clone(),
                constraint: name.to_string(),
            })?;

        match condition {
            Some(decl) => {
                let predicate = convert(decl).map_err(|e| match e {
                    ParseError::UnsupportedLookup(lookup) => ExtractionError::UnsupportedLookup {
                        constraint: name.to_string(),
                        lookup,
                    },
                    ParseError::Invalid(reason) => ExtractionError::InvalidCondition {
                        constraint: name.to_string(),
                        reason,
                    },
                })?;
                check_predicate(entity, name, &predicate)?;
                Ok(descriptor.with_condition(predicate))
            }
            None => Ok(descriptor),
        }
    }
}

/// Deterministic name for a compound field tuple.
fn together_name(entity: &str, fields: &[String]) -> String {
    format!("{}_{}_unique", entity.to_lowercase(), fields.join("_"))
}

fn push_or_replace(descriptors: &mut Vec<ConstraintDescriptor>, descriptor: ConstraintDescriptor) {
    match descriptors.iter_mut().find(|d| d.name() == descriptor.name()) {
        Some(slot) => *slot = descriptor,
        None => descriptors.push(descriptor),
    }
}

fn convert(decl: &ConditionDecl) -> Result<Predicate, ParseError> {
    match decl {
        ConditionDecl::Lookup { key, value } => parser::parse_lookup(key, value),
        ConditionDecl::Expression(text) => parser::parse_expression(text),
        ConditionDecl::And(children) => {
            if children.is_empty() {
                return Err(ParseError::Invalid("empty AND".to_string()));
            }
            Ok(Predicate::And(children.iter().map(convert).collect::<Result<_, _>>()?))
        }
        ConditionDecl::Or(children) => {
            if children.is_empty() {
                return Err(ParseError::Invalid("empty OR".to_string()));
            }
            Ok(Predicate::Or(children.iter().map(convert).collect::<Result<_, _>>()?))
        }
        ConditionDecl::Not(child) => Ok(convert(child)?.not()),
    }
}

/// Every leaf must name a field of the entity with a literal of a compatible type.
fn check_predicate(
    entity: &EntityDef,
    constraint: &str,
    predicate: &Predicate,
) -> Result<(), ExtractionError> {
    match predicate {
        Predicate::Leaf(cmp) => {
            if !entity.has_field(&cmp.field) {
                return Err(ExtractionError::UnknownField {
                    entity: entity.name.clone(),
                    constraint: constraint.to_string(),
                    field: cmp.field.clone(),
                });
            }
            let Some(field) = entity.get_field(&cmp.field) else {
                return Ok(());
            };
            let literals: &[Value] = match &cmp.op {
                Operator::Eq(v)
                | Operator::Ne(v)
                | Operator::Lt(v)
                | Operator::Le(v)
                | Operator::Gt(v)
                | Operator::Ge(v) => std::slice::from_ref(v),
                Operator::In(values) => values,
                Operator::IsNull(_) => &[],
            };
            match literals.iter().find(|v| !field.field_type.accepts(v)) {
                Some(bad) => Err(ExtractionError::InvalidCondition {
                    constraint: constraint.to_string(),
                    reason: format!(
                        "field '{}' cannot be compared with {} literal {}",
                        cmp.field,
                        bad.type_name(),
                        bad
                    ),
                }),
                None => Ok(()),
            }
        }
        Predicate::And(children) | Predicate::Or(children) => children
            .iter()
            .try_for_each(|child| check_predicate(entity, constraint, child)),
        Predicate::Not(child) => check_predicate(entity, constraint, child),
    }
}
