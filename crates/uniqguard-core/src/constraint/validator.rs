//! Validation of candidate rows against their unique constraints.

use tracing::warn;

use crate::config::{DatabaseSettings, EvaluationPolicy, LogLevel};
use crate::error::{ConstraintViolation, Error, EvaluationError};
use crate::storage::{Row, RowId};

use super::{ConditionEvaluator, ConstraintDescriptor, Predicate, Value};

/// Emit a routine diagnostic at a level chosen at runtime.
macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            LogLevel::Trace => tracing::trace!($($arg)+),
            LogLevel::Debug => tracing::debug!($($arg)+),
            LogLevel::Info => tracing::info!($($arg)+),
            LogLevel::Warn => tracing::warn!($($arg)+),
            LogLevel::Error => tracing::error!($($arg)+),
        }
    };
}

/// An existence query against stored rows.
#[derive(Debug, Clone)]
pub struct ConflictLookup<'a> {
    /// Entity whose rows are searched.
    pub entity: &'a str,
    /// Constraint being checked, used to scope protective locks.
    pub constraint: &'a str,
    /// Key fields and the candidate's values for them.
    pub equals: Vec<(&'a str, &'a Value)>,
    /// Stored rows must also satisfy this condition.
    pub condition: Option<&'a Predicate>,
    /// Identity to leave out of the result (the candidate itself on update).
    pub exclude: Option<RowId>,
    /// Hold a protective lock on the key until the enclosing transaction ends.
    pub lock: bool,
}

/// Storage query interface used by the validation engine.
///
/// Implementations translate the lookup's condition into their own filter
/// representation and evaluate it against stored rows.
pub trait ConflictSource {
    /// Whether the store can take protective locks.
    fn supports_row_locks(&self) -> bool;

    /// Identity of a stored row matching `lookup`, if any.
    fn find_conflict(&mut self, lookup: &ConflictLookup<'_>) -> Result<Option<RowId>, Error>;
}

/// What a validation pass did, for diagnostics and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    /// Constraints checked against storage.
    pub checked: usize,
    /// Constraints whose condition excluded the row.
    pub skipped_by_condition: usize,
    /// Constraints skipped because a key field is null.
    pub skipped_null: usize,
    /// Constraints skipped after an evaluation fault.
    pub skipped_on_error: usize,
    /// Protection was requested but the store could not lock.
    pub degraded: bool,
}

/// Checks a candidate row against the descriptors of its entity.
#[derive(Debug, Clone)]
pub struct UniqueValidator {
    protect: bool,
    log_level: LogLevel,
    policy: EvaluationPolicy,
}

impl UniqueValidator {
    /// Create a validator for one database.
    pub fn new(settings: &DatabaseSettings, policy: EvaluationPolicy) -> Self {
        Self {
            protect: settings.race_condition_protection,
            log_level: settings.log_level,
            policy,
        }
    }

    /// Validate `row` against every descriptor of `entity`.
    ///
    /// Descriptors of other entities are ignored. Returns the first conflict
    /// found as [`Error::ConstraintViolation`]; in the absence of a conflict
    /// every descriptor is attempted.
    pub fn validate(
        &self,
        entity: &str,
        row: &Row,
        descriptors: &[ConstraintDescriptor],
        store: &mut dyn ConflictSource,
    ) -> Result<ValidationSummary, Error> {
        let mut summary = ValidationSummary::default();

        let lock = if self.protect && !store.supports_row_locks() {
            warn!(
                entity = %entity,
                "Store does not support protective locks; uniqueness check is best-effort"
            );
            summary.degraded = true;
            false
        } else {
            self.protect
        };

        for descriptor in descriptors.iter().filter(|d| d.entity() == entity) {
            let constraint = descriptor.name();

            if let Some(condition) = descriptor.condition() {
                match ConditionEvaluator::evaluate(condition, &row.values) {
                    Ok(true) => {}
                    Ok(false) => {
                        event_at!(
                            self.log_level,
                            entity = %entity,
                            constraint = %constraint,
                            "Row outside constraint condition, skipping"
                        );
                        summary.skipped_by_condition += 1;
                        continue;
                    }
                    Err(e) => {
                        self.on_evaluation_error(entity, constraint, e)?;
                        summary.skipped_on_error += 1;
                        continue;
                    }
                }
            }

            let mut equals = Vec::with_capacity(descriptor.fields().len());
            for field in descriptor.fields() {
                match row.values.get(field) {
                    Some(value) => equals.push((field.as_str(), value)),
                    None => {
                        self.on_evaluation_error(
                            entity,
                            constraint,
                            EvaluationError::UnknownField(field.clone()),
                        )?;
                        break;
                    }
                }
            }
            if equals.len() < descriptor.fields().len() {
                summary.skipped_on_error += 1;
                continue;
            }
            if equals.iter().any(|(_, v)| v.is_null()) {
                event_at!(
                    self.log_level,
                    entity = %entity,
                    constraint = %constraint,
                    "Null key value, skipping"
                );
                summary.skipped_null += 1;
                continue;
            }

            let lookup = ConflictLookup {
                entity,
                constraint,
                equals,
                condition: descriptor.condition(),
                exclude: row.id,
                lock,
            };

            summary.checked += 1;
            if let Some(existing_id) = store.find_conflict(&lookup)? {
                warn!(
                    entity = %entity,
                    constraint = %constraint,
                    existing = %hex::encode(existing_id),
                    "Unique constraint violated"
                );
                return Err(ConstraintViolation {
                    constraint: constraint.to_string(),
                    entity: entity.to_string(),
                    fields: descriptor.fields().to_vec(),
                    values: lookup.equals.iter().map(|(_, v)| (*v).clone()).collect(),
                    existing_id,
                }
                .into());
            }

            event_at!(
                self.log_level,
                entity = %entity,
                constraint = %constraint,
                locked = lookup.lock,
                "Unique constraint satisfied"
            );
        }

        Ok(summary)
    }

    fn on_evaluation_error(
        &self,
        entity: &str,
        constraint: &str,
        error: EvaluationError,
    ) -> Result<(), Error> {
        match self.policy {
            EvaluationPolicy::Fail => Err(error.into()),
            EvaluationPolicy::Skip => {
                warn!(
                    entity = %entity,
                    constraint = %constraint,
                    error = %error,
                    "Cannot evaluate constraint, skipping"
                );
                Ok(())
            }
        }
    }
}
