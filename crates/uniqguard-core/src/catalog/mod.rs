//! Model metadata catalog.
//!
//! The catalog describes entities, their fields and the uniqueness rules they
//! declare. It is the read-only input of constraint extraction.

mod declaration;
mod entity;
mod field;
mod schema;
mod types;

pub use declaration::{ConditionDecl, LookupValue, UniqueDecl};
pub use entity::EntityDef;
pub use field::FieldDef;
pub use schema::{ModelSource, SchemaBundle};
pub use types::{FieldType, ScalarType};
