//! Unique constraint enforcement.
//!
//! This module turns declared uniqueness rules into evaluable descriptors and
//! checks candidate rows against them:
//! - Extraction of descriptors from entity metadata
//! - In-memory condition evaluation
//! - Conflict validation against a storage query interface
//! - SQL rendering of existence checks

mod descriptor;
mod evaluator;
mod extractor;
mod parser;
mod predicate;
pub mod sql;
mod validator;
mod value;

pub use descriptor::ConstraintDescriptor;
pub use evaluator::ConditionEvaluator;
pub use extractor::ConstraintExtractor;
pub use predicate::{Comparison, Operator, Predicate};
pub use sql::{ExistenceQuery, SqlDialect};
pub use validator::{ConflictLookup, ConflictSource, UniqueValidator, ValidationSummary};
pub use value::Value;
