//! KvStore implementation
//!
//! HashMap-based store with RwLock for concurrency.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{LedgerError, Result};

/// Concurrent in-memory key-value map
///
/// Reads take the shared lock and may run in parallel; `upsert` and
/// `delete` take the exclusive lock. No method holds the lock across I/O.
pub struct KvStore {
    data: RwLock<HashMap<String, String>>,
}

impl KvStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Get a copy of the value stored under `key`
    pub fn get(&self, key: &str) -> Result<String> {
        self.data
            .read()
            .get(key)
            .cloned()
            .ok_or(LedgerError::KeyNotFound)
    }

    /// Snapshot every pair; the returned map is detached from the store
    pub fn get_all(&self) -> HashMap<String, String> {
        self.data.read().clone()
    }

    /// Insert or overwrite a pair
    pub fn upsert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.data.write().insert(key.into(), value.into());
    }

    /// Remove a key, failing with `KeyNotFound` if it is absent
    pub fn delete(&self, key: &str) -> Result<()> {
        match self.data.write().remove(key) {
            Some(_) => Ok(()),
            None => Err(LedgerError::KeyNotFound),
        }
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for KvStore {
    fn default() -> Self {
        Self::new()
    }
}
