//! Core error types.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::constraint::Value;

/// Core errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// I/O error (settings and schema files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Constraint metadata could not be turned into descriptors.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// A condition could not be evaluated against a candidate row.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// A candidate row collides with a stored row.
    #[error(transparent)]
    ConstraintViolation(#[from] ConstraintViolation),

    /// Waiting for a protective lock exceeded the configured timeout.
    #[error("lock wait timeout after {waited:?}")]
    LockTimeout {
        /// How long the caller waited.
        waited: Duration,
    },

    /// Stored key has an unexpected layout.
    #[error("invalid key format")]
    InvalidKey,

    /// Record not found.
    #[error("record not found")]
    NotFound,

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns the violation if this error is a uniqueness conflict.
    pub fn as_violation(&self) -> Option<&ConstraintViolation> {
        match self {
            Error::ConstraintViolation(v) => Some(v),
            _ => None,
        }
    }
}

/// Malformed or unsupported constraint metadata.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    /// The entity is abstract or a proxy and owns no rows of its own.
    #[error("entity '{entity}' is not a concrete persistable model")]
    NotConcrete {
        /// Entity name.
        entity: String,
    },

    /// The entity is not known to the model source.
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    /// A unique declaration has no fields.
    #[error("constraint '{constraint}' on '{entity}' declares no fields")]
    EmptyFields {
        /// Entity name.
        entity: String,
        /// Constraint name.
        constraint: String,
    },

    /// A field is listed twice in one unique declaration.
    #[error("constraint '{constraint}' on '{entity}' lists field '{field}' twice")]
    DuplicateField {
        /// Entity name.
        entity: String,
        /// Constraint name.
        constraint: String,
        /// Repeated field.
        field: String,
    },

    /// A declared or referenced field does not exist on the entity.
    #[error("constraint '{constraint}' references unknown field '{field}' on '{entity}'")]
    UnknownField {
        /// Entity name.
        entity: String,
        /// Constraint name.
        constraint: String,
        /// Missing field.
        field: String,
    },

    /// A lookup key uses an operator or relation span that is not supported.
    #[error("constraint '{constraint}' uses unsupported lookup '{lookup}'")]
    UnsupportedLookup {
        /// Constraint name.
        constraint: String,
        /// Offending lookup key.
        lookup: String,
    },

    /// A condition could not be parsed or has an unsupported shape.
    #[error("constraint '{constraint}' has an invalid condition: {reason}")]
    InvalidCondition {
        /// Constraint name.
        constraint: String,
        /// Why the condition was rejected.
        reason: String,
    },
}

/// Inconsistency between a condition and the candidate row it is evaluated against.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// Field referenced by the condition is absent from the candidate row.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// Ordering comparison between incompatible types.
    #[error("type mismatch: cannot compare {left_type} with {right_type}")]
    TypeMismatch {
        /// Left operand type.
        left_type: String,
        /// Right operand type.
        right_type: String,
    },
}

/// A candidate row duplicates the key of an existing row.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintViolation {
    /// Name of the violated constraint.
    pub constraint: String,
    /// Entity the constraint belongs to.
    pub entity: String,
    /// Key fields, in declaration order.
    pub fields: Vec<String>,
    /// Candidate values for the key fields.
    pub values: Vec<Value>,
    /// Identity of the stored row that already holds the key.
    pub existing_id: [u8; 16],
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.values.iter().map(ToString::to_string).collect();
        write!(
            f,
            "unique constraint '{}' violated: {} with ({})=({}) already exists",
            self.constraint,
            self.entity,
            self.fields.join(", "),
            values.join(", ")
        )
    }
}

impl std::error::Error for ConstraintViolation {}
