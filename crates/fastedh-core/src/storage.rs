//! Durable key-value storage.
//!
//! This module provides the synchronous, origin-scoped store that backs every
//! persistent cell. Keys are plain strings and values are JSON text, the same
//! contract a browser's `localStorage` offers:
//!
//! - [`RedbStore`]: file-backed, ACID, shared by every context of one origin
//! - [`MemoryStore`]: process-local map, used in tests and as a scratch store

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};

use crate::error::TrackerError;

const LOCAL_STORAGE_TABLE: TableDefinition<&str, &str> = TableDefinition::new("local_storage");

/// Synchronous string-to-string store shared by all contexts of an origin.
///
/// Writes are last-write-wins per key; there is no field-level merge.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value stored under `key`.
    fn get_item(&self, key: &str) -> Result<Option<String>, TrackerError>;

    /// Replace the value stored under `key`.
    fn set_item(&self, key: &str, value: &str) -> Result<(), TrackerError>;

    /// Remove `key`, returning whether it existed.
    fn remove_item(&self, key: &str) -> Result<bool, TrackerError>;

    /// All keys currently present, in lexicographic order.
    fn keys(&self) -> Result<Vec<String>, TrackerError>;
}

/// Durable store using redb
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<RwLock<Database>>,
}

impl RedbStore {
    /// Open (or create) the store at the given path.
    ///
    /// Creates the parent directory and the `local_storage` table if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(LOCAL_STORAGE_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }
}

impl KeyValueStore for RedbStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, TrackerError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(LOCAL_STORAGE_TABLE)?;

        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), TrackerError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(LOCAL_STORAGE_TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<bool, TrackerError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(LOCAL_STORAGE_TABLE)?;
            let removed = table.remove(key)?;
            removed.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    fn keys(&self) -> Result<Vec<String>, TrackerError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(LOCAL_STORAGE_TABLE)?;

        let mut keys = Vec::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}

/// In-process store; contents vanish with the process.
#[derive(Clone, Default)]
pub struct MemoryStore {
    items: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, TrackerError> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), TrackerError> {
        self.items.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<bool, TrackerError> {
        Ok(self.items.write().remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, TrackerError> {
        Ok(self.items.read().keys().cloned().collect())
    }
}
