//! Process-wide cache of extracted constraint descriptors.
//!
//! Each entity moves through `Unregistered -> Cached` exactly once. Extraction
//! runs under the entity's map entry, so concurrent first use of the same
//! entity never produces duplicate or partial entries.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::catalog::EntityDef;
use crate::constraint::{ConstraintDescriptor, ConstraintExtractor};
use crate::error::ExtractionError;

/// Descriptors of one entity, shared with every caller.
pub type Descriptors = Arc<[ConstraintDescriptor]>;

/// Lazily populated mapping from entity name to its descriptors.
#[derive(Default)]
pub struct ConstraintRegistry {
    cache: DashMap<String, Descriptors>,
}

impl ConstraintRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptors of `entity`, extracting and caching them on first use.
    pub fn descriptors_for(&self, entity: &EntityDef) -> Result<Descriptors, ExtractionError> {
        if let Some(cached) = self.cache.get(&entity.name) {
            return Ok(Arc::clone(cached.value()));
        }

        let entry = self
            .cache
            .entry(entity.name.clone())
            .or_try_insert_with(|| {
                debug!(entity = %entity.name, "Registering unique constraints");
                ConstraintExtractor::extract(entity).map(Arc::from)
            })?;
        Ok(Arc::clone(entry.value()))
    }

    /// Extract `entity` now, replacing any cached descriptors.
    ///
    /// Returns the number of descriptors registered.
    pub fn register(&self, entity: &EntityDef) -> Result<usize, ExtractionError> {
        let descriptors: Descriptors = ConstraintExtractor::extract(entity)?.into();
        let count = descriptors.len();
        self.cache.insert(entity.name.clone(), descriptors);
        debug!(entity = %entity.name, count, "Registered unique constraints");
        Ok(count)
    }

    /// Add one descriptor to `entity`, replacing a descriptor of the same name.
    ///
    /// The entity's declared constraints are extracted first if they are not
    /// cached yet, so a hand-registered descriptor never hides them.
    pub fn register_descriptor(
        &self,
        entity: &EntityDef,
        descriptor: ConstraintDescriptor,
    ) -> Result<(), ExtractionError> {
        if descriptor.entity() != entity.name {
            return Err(ExtractionError::UnknownEntity(descriptor.entity().to_string()));
        }
        if !entity.is_concrete() {
            return Err(ExtractionError::NotConcrete {
                entity: entity.name.clone(),
            });
        }
        let referenced = descriptor
            .fields()
            .iter()
            .map(String::as_str)
            .chain(descriptor.condition().into_iter().flat_map(|c| c.fields()));
        for field in referenced {
            if !entity.has_field(field) {
                return Err(ExtractionError::UnknownField {
                    entity: entity.name.clone(),
                    constraint: descriptor.name().to_string(),
                    field: field.to_string(),
                });
            }
        }

        let mut entry = self
            .cache
            .entry(entity.name.clone())
            .or_try_insert_with(|| ConstraintExtractor::extract(entity).map(Arc::from))?;

        let mut descriptors = entry.value().to_vec();
        match descriptors.iter_mut().find(|d| d.name() == descriptor.name()) {
            Some(slot) => *slot = descriptor,
            None => descriptors.push(descriptor),
        }
        *entry.value_mut() = descriptors.into();
        Ok(())
    }

    /// Whether descriptors for `entity` are cached.
    pub fn is_cached(&self, entity: &str) -> bool {
        self.cache.contains_key(entity)
    }

    /// Drop the cached descriptors of `entity`. Returns whether any were cached.
    pub fn invalidate(&self, entity: &str) -> bool {
        self.cache.remove(entity).is_some()
    }

    /// Number of cached entities.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// All cached entries, sorted by entity name.
    pub fn snapshot(&self) -> Vec<(String, Descriptors)> {
        let mut entries: Vec<(String, Descriptors)> = self
            .cache
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
