//! Durable key-value persistence.
//!
//! The [`KeyValueStore`] trait is the storage capability the engine depends
//! on: string keys mapped to JSON values. Any backend (embedded database,
//! flat files, OS-provided store) can satisfy it.
//!
//! [`TrackingStateStore`] layers the engine's namespaced keys and typed
//! accessors on top of any `KeyValueStore`.
//!
//! # Example
//!
//! ```ignore
//! use fieldtrack::store::{JsonFileStore, TrackingStateStore};
//! use std::sync::Arc;
//!
//! let kv = Arc::new(JsonFileStore::open("/var/lib/fieldtrack").await?);
//! let state = TrackingStateStore::new(kv);
//!
//! state.save_session_state(Some("worker-7"), true).await?;
//! let (worker, tracking) = state.load_session_state().await?;
//! ```

mod file;
mod memory;
mod state;
mod traits;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use state::{keys, TrackingStateStore};
pub use traits::{BoxFuture, KeyValueStore, StoreError};
