//! Record type for stored rows.

use std::collections::HashMap;

use crate::constraint::Value;
use crate::error::Error;
use rkyv::{Archive, Deserialize, Serialize};

/// One stored field value.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Column {
    /// Field name.
    pub name: String,

    /// Field value.
    pub value: Value,
}

/// A stored row with metadata.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Record {
    /// Field values, sorted by name.
    pub columns: Vec<Column>,

    /// Write timestamp in microseconds since Unix epoch.
    pub created_at: u64,
}

impl Record {
    /// Create a new record with the current timestamp.
    pub fn new(values: &HashMap<String, Value>) -> Self {
        let mut columns: Vec<Column> = values
            .iter()
            .map(|(name, value)| Column {
                name: name.clone(),
                value: value.clone(),
            })
            .collect();
        columns.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            columns,
            created_at: super::key::current_timestamp(),
        }
    }

    /// Look up a column value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .binary_search_by(|c| c.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.columns[i].value)
    }

    /// Field values as a map.
    pub fn to_values(&self) -> HashMap<String, Value> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect()
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    ///
    /// sled values carry no alignment guarantee, so the bytes are copied
    /// into an aligned buffer first.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}
