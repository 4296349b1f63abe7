//! uniqguard core - application-level unique constraint enforcement.
//!
//! Entity metadata declares compound and conditional unique constraints.
//! This crate extracts them into descriptors, caches them per entity and
//! validates every candidate row before it is written, optionally under a
//! protective lock so concurrent writers cannot both pass the check.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod catalog;
pub mod config;
pub mod constraint;
pub mod error;
pub mod guard;
pub mod registry;
pub mod storage;

pub use catalog::{
    ConditionDecl, EntityDef, FieldDef, FieldType, LookupValue, ModelSource, ScalarType,
    SchemaBundle, UniqueDecl,
};
pub use config::{DatabaseSettings, EvaluationPolicy, LogLevel, Settings};
pub use constraint::{
    ConditionEvaluator, ConflictLookup, ConflictSource, ConstraintDescriptor, ConstraintExtractor,
    ExistenceQuery, Predicate, SqlDialect, UniqueValidator, ValidationSummary, Value,
};
pub use error::{ConstraintViolation, Error, EvaluationError, ExtractionError};
pub use guard::{SaveEvent, SaveHook, UniqueGuard};
pub use registry::ConstraintRegistry;
pub use storage::{Database, Row, RowId, StorageConfig, StorageEngine, Transaction};
