//! Discovery subcommands.
//!
//! Every command reads model metadata, extracts descriptors and reports on
//! them. Nothing here validates rows or touches storage.

use std::path::Path;

use tracing::{debug, warn};
use uniqguard_core::{
    ConstraintExtractor, ConstraintRegistry, DatabaseSettings, EntityDef, ExistenceQuery,
    ExtractionError, ModelSource, SchemaBundle, Settings, SqlDialect,
};

/// Schema plus the settings of the selected database alias.
pub struct Context {
    schema: SchemaBundle,
    database: DatabaseSettings,
}

/// One extracted descriptor, flattened for display.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorRow {
    pub app: String,
    pub entity: String,
    pub name: String,
    pub fields: Vec<String>,
    pub condition: Option<String>,
}

/// Outcome of extracting every entity.
#[derive(Debug, Default)]
pub struct CheckReport {
    /// Entities that extracted cleanly, with their descriptor count.
    pub passed: Vec<(String, usize)>,
    /// Entities whose metadata was rejected.
    pub failed: Vec<(String, ExtractionError)>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A rendered existence query for one descriptor.
#[derive(Debug, Clone)]
pub struct QueryRow {
    pub entity: String,
    pub name: String,
    pub query: ExistenceQuery,
}

impl Context {
    pub fn new(schema: SchemaBundle, database: DatabaseSettings) -> Self {
        Self { schema, database }
    }

    /// Load the schema file and, if given, the settings file.
    pub fn load(
        schema: &Path,
        settings: Option<&Path>,
        alias: &str,
    ) -> Result<Self, uniqguard_core::Error> {
        let bundle = SchemaBundle::load(schema)?;
        let settings = match settings {
            Some(path) => Settings::load(path)?,
            None => Settings::new(),
        };
        let database = settings.database(alias);
        debug!(
            alias = %alias,
            entities = bundle.entities.len(),
            excluded = database.excluded_apps.len(),
            "Loaded schema"
        );
        Ok(Self::new(bundle, database))
    }

    /// Concrete entities outside the excluded apps.
    fn entities(&self) -> impl Iterator<Item = &EntityDef> {
        self.schema
            .entities()
            .into_iter()
            .filter(|e| e.is_concrete() && !self.database.is_excluded(&e.app))
    }

    fn entity(&self, name: &str) -> Result<&EntityDef, ExtractionError> {
        self.entities()
            .find(|e| e.name == name)
            .ok_or_else(|| ExtractionError::UnknownEntity(name.to_string()))
    }

    fn selected(&self, only: Option<&str>) -> Result<Vec<&EntityDef>, ExtractionError> {
        match only {
            Some(name) => Ok(vec![self.entity(name)?]),
            None => Ok(self.entities().collect()),
        }
    }
}

/// Enumerate descriptors of every visible entity, or of one.
pub fn list(ctx: &Context, only: Option<&str>) -> Result<Vec<DescriptorRow>, ExtractionError> {
    let registry = ConstraintRegistry::new();
    for entity in ctx.selected(only)? {
        registry.register(entity)?;
    }

    let mut rows = Vec::new();
    for (entity, descriptors) in registry.snapshot() {
        let app = ctx.entity(&entity)?.app.clone();
        rows.extend(descriptors.iter().map(|d| DescriptorRow {
            app: app.clone(),
            entity: entity.clone(),
            name: d.name().to_string(),
            fields: d.fields().to_vec(),
            condition: d.condition().map(ToString::to_string),
        }));
    }
    Ok(rows)
}

/// Extract every visible entity and collect all failures.
pub fn check(ctx: &Context) -> CheckReport {
    let mut report = CheckReport::default();
    for entity in ctx.entities() {
        match ConstraintExtractor::extract(entity) {
            Ok(descriptors) => report.passed.push((entity.name.clone(), descriptors.len())),
            Err(e) => {
                warn!(entity = %entity.name, error = %e, "Invalid unique metadata");
                report.failed.push((entity.name.clone(), e));
            }
        }
    }
    report
}

/// Render the existence query of every descriptor.
pub fn sql(
    ctx: &Context,
    dialect: SqlDialect,
    only: Option<&str>,
    exclude_identity: bool,
) -> Result<Vec<QueryRow>, ExtractionError> {
    let lock = ctx.database.race_condition_protection;
    if lock && !dialect.supports_row_locks() {
        warn!(dialect = %dialect, "Dialect has no row locks; queries are unprotected");
    }

    let mut rows = Vec::new();
    for entity in ctx.selected(only)? {
        for descriptor in ConstraintExtractor::extract(entity)? {
            let query = dialect.existence_query(entity, &descriptor, exclude_identity, lock);
            rows.push(QueryRow {
                entity: entity.name.clone(),
                name: descriptor.name().to_string(),
                query,
            });
        }
    }
    Ok(rows)
}
