//! Flat-file store: one JSON document per key.
//!
//! Keys are encoded into file names so any string key maps to exactly one
//! file. Writes go to a uniquely named temporary file that is renamed over
//! the target, so a crash mid-write leaves either the old or the new value
//! and concurrent writes to one key never interleave.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::traits::{BoxFuture, KeyValueStore, StoreError};

const EXTENSION: &str = "json";

/// Directory-backed key-value store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        tracing::debug!(root = %root.display(), "Opened JSON file store");
        Ok(Self { root })
    }

    /// Directory holding the store's files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{}.{}", encode_key(key), EXTENSION)))
    }
}

/// Encode a key into a portable file stem.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes
/// `%XX`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// Write through a uniquely named temp file in `dir`, then rename it over
/// `path`. Concurrent writers to the same key never share a temp file; the
/// last rename wins.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".write-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_data()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<serde_json::Value>, StoreError>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.path_for(&key)?;
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StoreError::Serialization { key, source })
        })
    }

    fn set(&self, key: &str, value: serde_json::Value) -> BoxFuture<'_, Result<(), StoreError>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.path_for(&key)?;
            let bytes = serde_json::to_vec_pretty(&value)
                .map_err(|source| StoreError::Serialization { key, source })?;

            let root = self.root.clone();
            tokio::task::spawn_blocking(move || write_atomic(&root, &path, &bytes))
                .await
                .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.path_for(&key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }
}
