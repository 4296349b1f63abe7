//! Candidate rows.

use std::collections::HashMap;

use super::RowId;
use crate::constraint::Value;

/// An in-memory row about to be persisted.
///
/// `id` is `None` until the row has been saved once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Persisted identity, if any.
    pub id: Option<RowId>,

    /// Field values by name.
    pub values: HashMap<String, Value>,
}

impl Row {
    /// Create an empty, unsaved row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field value.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Set the persisted identity.
    pub fn with_id(mut self, id: RowId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set a field value in place.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }
}
