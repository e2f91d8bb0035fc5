//! Core storage trait and errors.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error from the underlying medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded or decoded as JSON.
    #[error("Serialization error for key '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The key cannot be represented by this store.
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Generic async key-value interface with JSON values.
///
/// All implementations must be `Send + Sync` for use across async tasks.
/// Methods return boxed futures so the trait can be used as
/// `Arc<dyn KeyValueStore>`.
pub trait KeyValueStore: Send + Sync {
    /// Retrieve a value by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<serde_json::Value>, StoreError>>;

    /// Store a value, replacing any existing value for the key.
    fn set(&self, key: &str, value: serde_json::Value) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Remove a key.
    ///
    /// Returns `Ok(true)` if the key existed.
    fn remove(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>>;
}
