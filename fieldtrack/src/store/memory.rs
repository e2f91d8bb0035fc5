//! In-memory store backed by `DashMap`.
//!
//! Useful for tests and for hosts that provide persistence elsewhere. State
//! does not survive a process restart.

use dashmap::DashMap;

use super::traits::{BoxFuture, KeyValueStore, StoreError};

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, serde_json::Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<serde_json::Value>, StoreError>> {
        let value = self.entries.get(key).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(value) })
    }

    fn set(&self, key: &str, value: serde_json::Value) -> BoxFuture<'_, Result<(), StoreError>> {
        self.entries.insert(key.to_string(), value);
        Box::pin(async move { Ok(()) })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        let existed = self.entries.remove(key).is_some();
        Box::pin(async move { Ok(existed) })
    }
}
