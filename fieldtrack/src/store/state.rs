//! Typed tracking state on top of a [`KeyValueStore`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::geo::{now_millis, LocationSample};
use crate::geofence::GeofenceRegion;

use super::traits::{KeyValueStore, StoreError};

/// Namespaced keys used by the tracking engine.
pub mod keys {
    /// Prefix shared by every key the engine writes.
    pub const NAMESPACE: &str = "fieldtrack";
    /// Last known location sample.
    pub const LAST_LOCATION: &str = "fieldtrack:last_location";
    /// Active session (worker id + tracking flag).
    pub const SESSION: &str = "fieldtrack:session";
    /// Authored region list.
    pub const REGIONS: &str = "fieldtrack:regions";
    /// Prefix for per-region membership bits.
    pub const MEMBERSHIP_PREFIX: &str = "fieldtrack:membership:";

    /// Membership key for a region id.
    pub fn membership(region_id: &str) -> String {
        format!("{}{}", MEMBERSHIP_PREFIX, region_id)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    #[serde(default)]
    worker_id: Option<String>,
    #[serde(default)]
    is_tracking: bool,
    #[serde(default)]
    updated_at: i64,
}

/// Durable tracking state: last-known sample, session, memberships, regions.
///
/// Cheap to clone; clones share the underlying store.
#[derive(Clone)]
pub struct TrackingStateStore {
    kv: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for TrackingStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingStateStore").finish_non_exhaustive()
    }
}

impl TrackingStateStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    async fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_value(value).map_err(|source| StoreError::Serialization {
            key: key.to_string(),
            source,
        })?;
        self.kv.set(key, json).await
    }

    async fn fetch<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.kv.get(key).await? {
            None => Ok(None),
            Some(json) => serde_json::from_value(json)
                .map(Some)
                .map_err(|source| StoreError::Serialization {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    pub async fn save_last_known_location(&self, sample: &LocationSample) -> Result<(), StoreError> {
        self.put(keys::LAST_LOCATION, sample).await
    }

    pub async fn load_last_known_location(&self) -> Result<Option<LocationSample>, StoreError> {
        self.fetch(keys::LAST_LOCATION).await
    }

    /// Persist the session flag and worker id.
    pub async fn save_session_state(
        &self,
        worker_id: Option<&str>,
        is_tracking: bool,
    ) -> Result<(), StoreError> {
        let session = PersistedSession {
            worker_id: worker_id.map(str::to_string),
            is_tracking,
            updated_at: now_millis(),
        };
        self.put(keys::SESSION, &session).await
    }

    /// Load the persisted session as `(worker_id, is_tracking)`.
    ///
    /// A missing record reads as `(None, false)`.
    pub async fn load_session_state(&self) -> Result<(Option<String>, bool), StoreError> {
        Ok(self
            .fetch::<PersistedSession>(keys::SESSION)
            .await?
            .map(|s| (s.worker_id, s.is_tracking))
            .unwrap_or((None, false)))
    }

    /// Remove the persisted session entirely.
    pub async fn clear_session_state(&self) -> Result<(), StoreError> {
        self.kv.remove(keys::SESSION).await.map(|_| ())
    }

    pub async fn save_membership(&self, region_id: &str, inside: bool) -> Result<(), StoreError> {
        self.put(&keys::membership(region_id), &inside).await
    }

    /// Load a region's membership, defaulting to outside.
    pub async fn load_membership(&self, region_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .fetch::<bool>(&keys::membership(region_id))
            .await?
            .unwrap_or(false))
    }

    pub async fn remove_membership(&self, region_id: &str) -> Result<(), StoreError> {
        self.kv.remove(&keys::membership(region_id)).await.map(|_| ())
    }

    pub async fn save_region_list(&self, regions: &[GeofenceRegion]) -> Result<(), StoreError> {
        self.put(keys::REGIONS, &regions).await
    }

    /// Load the region list, empty if none was saved.
    pub async fn load_region_list(&self) -> Result<Vec<GeofenceRegion>, StoreError> {
        Ok(self.fetch(keys::REGIONS).await?.unwrap_or_default())
    }
}
