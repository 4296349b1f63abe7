//! Schema bundle - the set of models known to the process.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::EntityDef;
use crate::error::Error;

/// Read-only access to model metadata.
pub trait ModelSource: Send + Sync {
    /// Look up an entity by name.
    fn entity(&self, name: &str) -> Option<&EntityDef>;

    /// All entities, in a stable order.
    fn entities(&self) -> Vec<&EntityDef>;
}

/// A snapshot of every model definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaBundle {
    /// Entity definitions keyed by name.
    #[serde(default)]
    pub entities: BTreeMap<String, EntityDef>,
}

/// On-disk shape: a plain list of entities.
#[derive(Deserialize)]
struct SchemaFile {
    entities: Vec<EntityDef>,
}

impl SchemaBundle {
    /// Create an empty schema bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity to the schema.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// List all entity names.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(|s| s.as_str()).collect()
    }

    /// Parse a schema from JSON of the form `{"entities": [...]}`.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let file: SchemaFile =
            serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))?;
        Ok(file
            .entities
            .into_iter()
            .fold(Self::new(), |schema, entity| schema.with_entity(entity)))
    }

    /// Load a schema JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl ModelSource for SchemaBundle {
    fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.get_entity(name)
    }

    fn entities(&self) -> Vec<&EntityDef> {
        self.entities.values().collect()
    }
}
