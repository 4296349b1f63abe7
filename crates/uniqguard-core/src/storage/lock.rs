//! Protective locks for uniqueness checks.
//!
//! A lock covers one key of one constraint: `(entity, constraint, key values)`
//! hashed with blake3. It is taken before the existence check and held by the
//! owning transaction until it commits or rolls back, so a second writer with
//! the same key blocks until the first one's outcome is visible.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::constraint::Value;
use crate::error::Error;

/// Digest identifying one locked key.
pub type LockKey = [u8; 32];

/// Identity of a lock owner (a transaction).
pub type OwnerId = u64;

/// Table of held key locks.
pub struct LockManager {
    held: Mutex<HashMap<LockKey, OwnerId>>,
    released: Condvar,
    timeout: Duration,
}

impl LockManager {
    /// Create a lock manager whose waiters give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            held: Mutex::new(HashMap::new()),
            released: Condvar::new(),
            timeout,
        }
    }

    /// Digest of a constraint key.
    pub fn key(entity: &str, constraint: &str, values: &[(&str, &Value)]) -> LockKey {
        let mut buf = Vec::with_capacity(64);
        for part in [entity, constraint] {
            buf.extend_from_slice(&(part.len() as u64).to_be_bytes());
            buf.extend_from_slice(part.as_bytes());
        }
        for (_, value) in values {
            value.encode_key(&mut buf);
        }
        *blake3::hash(&buf).as_bytes()
    }

    /// Take `key` for `owner`, waiting while another owner holds it.
    ///
    /// Returns `true` if the lock was newly taken and `false` if `owner`
    /// already held it.
    pub fn acquire(&self, key: LockKey, owner: OwnerId) -> Result<bool, Error> {
        let deadline = Instant::now() + self.timeout;
        let mut held = self.held.lock();

        loop {
            match held.get(&key) {
                None => {
                    held.insert(key, owner);
                    return Ok(true);
                }
                Some(&holder) if holder == owner => return Ok(false),
                Some(&holder) => {
                    debug!(
                        owner,
                        holder,
                        key = %hex::encode(&key[..8]),
                        "Waiting for protective lock"
                    );
                    if self.released.wait_until(&mut held, deadline).timed_out()
                        && held.get(&key).is_some_and(|h| *h != owner)
                    {
                        return Err(Error::LockTimeout {
                            waited: self.timeout,
                        });
                    }
                }
            }
        }
    }

    /// Release every key in `keys` held by `owner` and wake waiters.
    pub fn release_all(&self, owner: OwnerId, keys: &[LockKey]) {
        if keys.is_empty() {
            return;
        }
        let mut held = self.held.lock();
        for key in keys {
            if held.get(key) == Some(&owner) {
                held.remove(key);
            }
        }
        drop(held);
        self.released.notify_all();
    }

    /// Whether any owner holds `key`.
    pub fn is_locked(&self, key: &LockKey) -> bool {
        self.held.lock().contains_key(key)
    }

    /// Number of keys currently held.
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }
}
