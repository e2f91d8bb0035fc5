//! Tracking session record.

use crate::geo::now_millis;

/// An active tracking session.
///
/// A session exists only while tracking; stopping destroys it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingSession {
    worker_id: String,
    created_at: i64,
}

impl TrackingSession {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            created_at: now_millis(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Always true for an existing session.
    pub fn is_tracking(&self) -> bool {
        true
    }

    /// Creation time as epoch milliseconds.
    pub fn created_at(&self) -> i64 {
        self.created_at
    }
}
