//! Transactions: buffered writes, save hooks and conflict lookups.

use std::collections::{BTreeMap, HashSet};

use sled::transaction::TransactionError;
use tracing::{debug, trace};

use super::{Database, LockKey, LockManager, OwnerId, Record, Row, RowFilter, RowId, RowKey, StorageEngine};
use crate::constraint::{ConflictLookup, ConflictSource};
use crate::error::Error;
use crate::guard::SaveEvent;

/// A unit of work against a [`Database`].
///
/// Writes are buffered and applied atomically on commit. Protective locks
/// taken by conflict lookups are held until the transaction commits, rolls
/// back or is dropped.
pub struct Transaction<'a> {
    db: &'a Database,
    id: OwnerId,
    /// Pending writes; `None` deletes the row.
    writes: BTreeMap<RowKey, Option<Record>>,
    /// Protective locks held by this transaction.
    locks: Vec<LockKey>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(db: &'a Database, id: OwnerId) -> Self {
        Self {
            db,
            id,
            writes: BTreeMap::new(),
            locks: Vec::new(),
        }
    }

    /// Transaction identifier.
    pub fn id(&self) -> OwnerId {
        self.id
    }

    /// Run every save hook, then queue the write.
    ///
    /// A new row is assigned an identity, stored back into `row`. If a hook
    /// fails nothing is queued.
    pub fn save(&mut self, entity: &str, row: &mut Row) -> Result<RowId, Error> {
        let db = self.db;
        let event = SaveEvent {
            entity,
            database: db.alias(),
            row: &*row,
        };
        for hook in db.hooks() {
            hook.before_save(&event, &mut *self)?;
        }

        let id = row.id.unwrap_or_else(StorageEngine::generate_id);
        row.id = Some(id);
        self.writes
            .insert(RowKey::new(entity, id), Some(Record::new(&row.values)));
        trace!(txn = self.id, entity = %entity, id = %hex::encode(id), "Queued save");
        Ok(id)
    }

    /// Queue rows without running save hooks.
    ///
    /// Bulk writes bypass uniqueness validation entirely.
    pub fn bulk_insert(
        &mut self,
        entity: &str,
        rows: impl IntoIterator<Item = Row>,
    ) -> Vec<RowId> {
        rows.into_iter()
            .map(|row| {
                let id = row.id.unwrap_or_else(StorageEngine::generate_id);
                self.writes
                    .insert(RowKey::new(entity, id), Some(Record::new(&row.values)));
                id
            })
            .collect()
    }

    /// Read a row, seeing this transaction's own pending writes.
    pub fn get(&self, entity: &str, id: &RowId) -> Result<Option<Row>, Error> {
        let record = match self.writes.get(&RowKey::new(entity, *id)) {
            Some(pending) => pending.clone(),
            None => self.db.engine().get(entity, id)?,
        };
        Ok(record.map(|r| Row {
            id: Some(*id),
            values: r.to_values(),
        }))
    }

    /// Queue a delete. Returns whether the row was visible.
    pub fn delete(&mut self, entity: &str, id: &RowId) -> Result<bool, Error> {
        let existed = self.get(entity, id)?.is_some();
        self.writes.insert(RowKey::new(entity, *id), None);
        Ok(existed)
    }

    /// Number of queued writes.
    pub fn pending(&self) -> usize {
        self.writes.len()
    }

    /// Apply every queued write atomically and release held locks.
    pub fn commit(mut self) -> Result<(), Error> {
        let batch = self
            .writes
            .iter()
            .map(|(key, record)| {
                let bytes = record.as_ref().map(Record::to_bytes).transpose()?;
                Ok::<_, Error>((key.encode(), bytes))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        if !batch.is_empty() {
            let result: Result<(), TransactionError<Error>> =
                self.db.engine().data_tree().transaction(|tx| {
                    for (key, bytes) in &batch {
                        match bytes {
                            Some(bytes) => tx.insert(key.as_slice(), bytes.as_slice())?,
                            None => tx.remove(key.as_slice())?,
                        };
                    }
                    Ok(())
                });

            match result {
                Ok(()) => {}
                Err(TransactionError::Abort(e)) => return Err(e),
                Err(TransactionError::Storage(e)) => return Err(Error::Storage(e)),
            }
        }

        debug!(txn = self.id, writes = batch.len(), "Committed");
        self.writes.clear();
        self.release_locks();
        Ok(())
    }

    /// Discard every queued write and release held locks.
    pub fn rollback(self) {
        drop(self);
    }

    fn release_locks(&mut self) {
        self.db.locks().release_all(self.id, &self.locks);
        self.locks.clear();
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.writes.is_empty() {
            debug!(txn = self.id, writes = self.writes.len(), "Rolled back");
        }
        self.release_locks();
    }
}

impl ConflictSource for Transaction<'_> {
    fn supports_row_locks(&self) -> bool {
        self.db.supports_row_locks()
    }

    fn find_conflict(&mut self, lookup: &ConflictLookup<'_>) -> Result<Option<RowId>, Error> {
        if lookup.lock && self.db.supports_row_locks() {
            let key = LockManager::key(lookup.entity, lookup.constraint, &lookup.equals);
            if self.db.locks().acquire(key, self.id)? {
                self.locks.push(key);
            }
        }

        let filter = RowFilter::from_lookup(lookup);
        let mut shadowed = HashSet::new();

        for (key, pending) in &self.writes {
            if key.entity != lookup.entity {
                continue;
            }
            shadowed.insert(key.id);
            if Some(key.id) == lookup.exclude {
                continue;
            }
            if let Some(record) = pending {
                if filter.matches(record) {
                    return Ok(Some(key.id));
                }
            }
        }

        for item in self.db.engine().scan_entity(lookup.entity) {
            let (id, record) = item?;
            if shadowed.contains(&id) || Some(id) == lookup.exclude {
                continue;
            }
            if filter.matches(&record) {
                return Ok(Some(id));
            }
        }

        Ok(None)
    }
}
