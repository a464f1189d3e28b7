//! Store implementation
//!
//! HashMap-based store with RwLock for concurrency.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{DbError, Result};
use crate::protocol::Value;

/// In-memory mapping from key to value, shared by every session
///
/// Each method acquires the lock exactly once, so a concurrent `flush` either
/// sees all of a `set_many` or none of it.
#[derive(Debug, Default)]
pub struct Store {
    entries: RwLock<HashMap<Bytes, Value>>,
}

impl Store {
    /// Create a new empty Store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &[u8]) -> Result<Value> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| key_not_found(key))
    }

    /// Insert or overwrite a value (write lock)
    pub fn set(&self, key: Bytes, value: Value) {
        self.entries.write().insert(key, value);
    }

    /// Remove a key, returning whether it was present (write lock)
    pub fn delete(&self, key: &[u8]) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Remove every key, returning how many there were (write lock)
    pub fn flush(&self) -> usize {
        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        count
    }

    /// Get several values in key order
    ///
    /// Fails as a whole on the first missing key.
    pub fn get_many(&self, keys: &[Bytes]) -> Result<Vec<Value>> {
        let entries = self.entries.read();
        keys.iter()
            .map(|key| {
                entries
                    .get(key)
                    .cloned()
                    .ok_or_else(|| key_not_found(key))
            })
            .collect()
    }

    /// Insert several pairs under one write lock, returning the pair count
    pub fn set_many(&self, pairs: Vec<(Bytes, Value)>) -> usize {
        let count = pairs.len();
        let mut entries = self.entries.write();
        entries.extend(pairs);
        count
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Get entry count
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn key_not_found(key: &[u8]) -> DbError {
    DbError::KeyNotFound(String::from_utf8_lossy(key).into_owned())
}
