//! A named database: storage engine, protective locks and save hooks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use super::{LockManager, StorageConfig, StorageEngine, Transaction};
use crate::error::Error;
use crate::guard::SaveHook;

/// A database opened under an alias.
pub struct Database {
    alias: String,
    engine: StorageEngine,
    locks: LockManager,
    row_locks: bool,
    hooks: Vec<Arc<dyn SaveHook>>,
    next_txn: AtomicU64,
}

impl Database {
    /// Open or create the database behind `alias`.
    pub fn open(alias: impl Into<String>, config: StorageConfig) -> Result<Self, Error> {
        let alias = alias.into();
        let engine = StorageEngine::open(&config)?;
        info!(
            alias = %alias,
            path = %config.path.display(),
            row_locks = config.row_locks,
            "Opened database"
        );

        Ok(Self {
            alias,
            engine,
            locks: LockManager::new(config.lock_timeout),
            row_locks: config.row_locks,
            hooks: Vec::new(),
            next_txn: AtomicU64::new(1),
        })
    }

    /// Register a hook run before every save.
    pub fn with_hook(mut self, hook: Arc<dyn SaveHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Database alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The underlying storage engine.
    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    /// Protective lock table.
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Whether protective locks are available.
    pub fn supports_row_locks(&self) -> bool {
        self.row_locks
    }

    /// Start a transaction.
    pub fn begin(&self) -> Transaction<'_> {
        let id = self.next_txn.fetch_add(1, Ordering::Relaxed);
        Transaction::new(self, id)
    }

    pub(crate) fn hooks(&self) -> &[Arc<dyn SaveHook>] {
        &self.hooks
    }
}
