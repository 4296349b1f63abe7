//! Storage engine implementation.

use super::{Record, RowId, RowKey, StorageConfig};
use crate::error::Error;
use sled::{Db, Tree};

/// Tree name for row data.
const DATA_TREE: &str = "rows";

/// The main storage engine wrapping sled.
pub struct StorageEngine {
    /// The underlying sled database.
    db: Db,

    /// Tree for rows (entity + row id -> record).
    data_tree: Tree,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: &StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let data_tree = db.open_tree(DATA_TREE)?;

        Ok(Self { db, data_tree })
    }

    /// Check if the database was recovered from a previous crash.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// Write a row, replacing any previous version.
    pub fn put(&self, entity: &str, id: &RowId, record: &Record) -> Result<(), Error> {
        let key = RowKey::new(entity, *id);
        self.data_tree.insert(key.encode(), record.to_bytes()?)?;
        Ok(())
    }

    /// Get a row.
    pub fn get(&self, entity: &str, id: &RowId) -> Result<Option<Record>, Error> {
        let key = RowKey::new(entity, *id);
        match self.data_tree.get(key.encode())? {
            Some(bytes) => Ok(Some(Record::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete a row. Returns whether it existed.
    pub fn delete(&self, entity: &str, id: &RowId) -> Result<bool, Error> {
        let key = RowKey::new(entity, *id);
        Ok(self.data_tree.remove(key.encode())?.is_some())
    }

    /// Scan all rows of an entity, in row id order.
    pub fn scan_entity(
        &self,
        entity: &str,
    ) -> impl Iterator<Item = Result<(RowId, Record), Error>> + '_ {
        self.data_tree
            .scan_prefix(RowKey::entity_prefix(entity))
            .map(|result| {
                let (key_bytes, value_bytes) = result?;
                let key = RowKey::decode(&key_bytes).ok_or(Error::InvalidKey)?;
                let record = Record::from_bytes(&value_bytes)?;
                Ok((key.id, record))
            })
    }

    /// Count the rows of an entity.
    pub fn count(&self, entity: &str) -> usize {
        self.data_tree
            .scan_prefix(RowKey::entity_prefix(entity))
            .count()
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    /// Generate a new row ID: microsecond timestamp followed by a process-wide counter.
    ///
    /// Every byte of both halves is kept, so ids never repeat within a process.
    pub fn generate_id() -> RowId {
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let now = super::key::current_timestamp();
        let counter = COUNTER.fetch_add(1, Ordering::SeqCst);

        let mut id = [0u8; 16];
        id[..8].copy_from_slice(&now.to_be_bytes());
        id[8..16].copy_from_slice(&counter.to_be_bytes());
        id
    }

    /// Get access to the underlying data tree (for transactions).
    pub(crate) fn data_tree(&self) -> &Tree {
        &self.data_tree
    }
}
