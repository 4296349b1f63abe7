//! Constraint descriptors.

use std::fmt;

use super::Predicate;

/// One uniqueness rule: a field set that must be unique among the rows of
/// an entity, optionally restricted to rows matching a condition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintDescriptor {
    name: String,
    entity: String,
    fields: Vec<String>,
    condition: Option<Predicate>,
}

impl ConstraintDescriptor {
    /// Create an unconditional descriptor.
    ///
    /// Returns `None` if `fields` is empty.
    pub fn new(
        name: impl Into<String>,
        entity: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Option<Self> {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return None;
        }
        Some(Self {
            name: name.into(),
            entity: entity.into(),
            fields,
            condition: None,
        })
    }

    /// Restrict the descriptor to rows matching `condition`.
    pub fn with_condition(mut self, condition: Predicate) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Constraint name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning entity.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Key fields, never empty.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Scope condition, if any.
    pub fn condition(&self) -> Option<&Predicate> {
        self.condition.as_ref()
    }

    /// Whether the constraint applies to every row.
    pub fn is_unconditional(&self) -> bool {
        self.condition.is_none()
    }
}

impl fmt::Display for ConstraintDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} UNIQUE({})", self.entity, self.fields.join(", "))?;
        if let Some(condition) = &self.condition {
            write!(f, " WHERE {}", condition)?;
        }
        Ok(())
    }
}
