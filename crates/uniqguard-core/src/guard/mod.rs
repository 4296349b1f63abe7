//! Pre-save dispatch of uniqueness validation.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::catalog::ModelSource;
use crate::config::{DatabaseSettings, Settings};
use crate::constraint::{ConflictSource, UniqueValidator};
use crate::error::Error;
use crate::registry::ConstraintRegistry;
use crate::storage::Row;

/// A row about to be written.
#[derive(Debug, Clone, Copy)]
pub struct SaveEvent<'a> {
    /// Entity the row belongs to.
    pub entity: &'a str,
    /// Alias of the target database.
    pub database: &'a str,
    /// Candidate row.
    pub row: &'a Row,
}

/// Callback run synchronously before every row write.
///
/// Returning an error aborts the write.
pub trait SaveHook: Send + Sync {
    /// Inspect the candidate row; `store` answers existence queries within the
    /// writing transaction.
    fn before_save(&self, event: &SaveEvent<'_>, store: &mut dyn ConflictSource)
        -> Result<(), Error>;
}

/// Enforces the unique constraints declared by a model source.
pub struct UniqueGuard {
    models: Arc<dyn ModelSource>,
    settings: Settings,
    defaults: DatabaseSettings,
    registry: ConstraintRegistry,
}

impl UniqueGuard {
    /// Create a guard with an empty registry.
    pub fn new(models: Arc<dyn ModelSource>, settings: Settings) -> Self {
        Self {
            models,
            settings,
            defaults: DatabaseSettings::default(),
            registry: ConstraintRegistry::new(),
        }
    }

    /// The descriptor cache.
    pub fn registry(&self) -> &ConstraintRegistry {
        &self.registry
    }

    /// Loaded settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn database(&self, alias: &str) -> &DatabaseSettings {
        self.settings.databases.get(alias).unwrap_or(&self.defaults)
    }

    /// Extract every concrete entity that some configured database does not
    /// exclude, surfacing metadata errors before the first write.
    ///
    /// With no database configured, every concrete entity is registered.
    /// Returns the number of entities registered.
    pub fn register_all(&self) -> Result<usize, Error> {
        let databases: Vec<&DatabaseSettings> = if self.settings.databases.is_empty() {
            vec![&self.defaults]
        } else {
            self.settings.databases.values().collect()
        };

        let mut registered = 0;
        for entity in self.models.entities() {
            if !entity.is_concrete() {
                continue;
            }
            if databases.iter().all(|db| db.is_excluded(&entity.app)) {
                trace!(entity = %entity.name, app = %entity.app, "Excluded app, not registering");
                continue;
            }
            self.registry.register(entity)?;
            registered += 1;
        }
        debug!(count = registered, "Registered entities");
        Ok(registered)
    }
}

impl SaveHook for UniqueGuard {
    fn before_save(
        &self,
        event: &SaveEvent<'_>,
        store: &mut dyn ConflictSource,
    ) -> Result<(), Error> {
        let Some(entity) = self.models.entity(event.entity) else {
            trace!(entity = %event.entity, "Unknown entity, skipping");
            return Ok(());
        };

        let db = self.database(event.database);
        if db.is_excluded(&entity.app) || !entity.is_concrete() {
            return Ok(());
        }

        let descriptors = self.registry.descriptors_for(entity)?;
        if descriptors.is_empty() {
            return Ok(());
        }

        UniqueValidator::new(db, self.settings.on_evaluation_error).validate(
            event.entity,
            event.row,
            &descriptors,
            store,
        )?;
        Ok(())
    }
}
