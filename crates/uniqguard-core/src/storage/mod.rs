//! Storage layer for uniqguard.
//!
//! This module provides a sled-based row store with buffered transactions,
//! save hooks and protective key locks. It is the reference persistence
//! lifecycle the dispatch hook plugs into.

mod config;
mod database;
mod engine;
mod filter;
mod lock;
mod record;
mod row;
mod transaction;

pub mod key;

pub use config::StorageConfig;
pub use database::Database;
pub use engine::StorageEngine;
pub use filter::RowFilter;
pub use key::{RowId, RowKey};
pub use lock::{LockKey, LockManager, OwnerId};
pub use record::{Column, Record};
pub use row::Row;
pub use transaction::Transaction;
