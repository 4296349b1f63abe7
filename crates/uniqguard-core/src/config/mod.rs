//! Per-database enforcement settings.
//!
//! Settings are loaded once per process from a JSON document keyed by
//! database alias:
//!
//! ```json
//! {
//!   "databases": {
//!     "default": {
//!       "excluded_apps": ["audit"],
//!       "race_condition_protection": true,
//!       "log_level": "info"
//!     }
//!   },
//!   "on_evaluation_error": "skip"
//! }
//! ```
//!
//! Aliases and keys that are absent fall back to no exclusions, protection
//! enabled and informational logging.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Verbosity of routine diagnostic events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warn level.
    Warn,
    /// Error level.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// What to do when a condition cannot be evaluated against a candidate row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationPolicy {
    /// Log a warning and skip the affected constraint.
    #[default]
    Skip,
    /// Abort the write with the evaluation error.
    Fail,
}

fn default_protection() -> bool {
    true
}

/// Settings for one database alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Model groups whose entities are never extracted nor validated.
    #[serde(default)]
    pub excluded_apps: BTreeSet<String>,

    /// Hold protective locks across the check-then-write sequence.
    #[serde(default = "default_protection")]
    pub race_condition_protection: bool,

    /// Level of routine diagnostics.
    #[serde(default)]
    pub log_level: LogLevel,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            excluded_apps: BTreeSet::new(),
            race_condition_protection: default_protection(),
            log_level: LogLevel::default(),
        }
    }
}

impl DatabaseSettings {
    /// Exclude a model group.
    pub fn exclude_app(mut self, app: impl Into<String>) -> Self {
        self.excluded_apps.insert(app.into());
        self
    }

    /// Enable or disable race condition protection.
    pub fn with_race_condition_protection(mut self, enabled: bool) -> Self {
        self.race_condition_protection = enabled;
        self
    }

    /// Set the diagnostic log level.
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Whether entities of `app` are skipped.
    pub fn is_excluded(&self, app: &str) -> bool {
        self.excluded_apps.contains(app)
    }
}

/// Process-wide settings, immutable after load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Per-alias settings.
    #[serde(default)]
    pub databases: HashMap<String, DatabaseSettings>,

    /// Handling of condition evaluation faults.
    #[serde(default)]
    pub on_evaluation_error: EvaluationPolicy,
}

impl Settings {
    /// Create settings with every alias at its defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the settings of one alias.
    pub fn with_database(mut self, alias: impl Into<String>, settings: DatabaseSettings) -> Self {
        self.databases.insert(alias.into(), settings);
        self
    }

    /// Set the evaluation error policy.
    pub fn with_evaluation_policy(mut self, policy: EvaluationPolicy) -> Self {
        self.on_evaluation_error = policy;
        self
    }

    /// Settings of `alias`, or the defaults if the alias is not configured.
    pub fn database(&self, alias: &str) -> DatabaseSettings {
        self.databases.get(alias).cloned().unwrap_or_default()
    }

    /// Configured aliases, sorted.
    pub fn aliases(&self) -> Vec<&str> {
        let mut aliases: Vec<&str> = self.databases.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        aliases
    }

    /// Parse settings from JSON.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load a settings JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
