//! Platform position source abstraction.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::geo::LocationSample;
use crate::BoxFuture;

/// Reasons a position could not be produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    /// The platform could not provide a fix.
    #[error("Location unavailable: {0}")]
    Unavailable(String),

    /// The fetch did not complete in time.
    #[error("Location fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The only available fix is older than the staleness tolerance.
    #[error("Location fix is stale: {age_ms} ms old (max {max_age_ms} ms)")]
    Stale { age_ms: u64, max_age_ms: u64 },

    /// Location permission was revoked while sampling.
    #[error("Location permission denied")]
    PermissionDenied,
}

/// Options for a one-shot position fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchOptions {
    /// Upper bound on how long the fetch may take.
    pub timeout: Duration,
    /// A cached fix younger than this may be returned without a fresh fetch.
    pub max_age: Duration,
}

/// Options for a continuous watch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    /// Minimum movement in meters between emitted fixes.
    pub distance_filter_m: f64,
    /// Minimum time between emitted fixes.
    pub min_interval: Duration,
}

/// Items produced by a continuous watch.
pub type WatchStream = mpsc::Receiver<Result<LocationSample, LocationError>>;

/// Platform position API.
///
/// Implementations wrap whatever the host platform offers (GNSS receiver,
/// OS location service, recorded track).
pub trait LocationProvider: Send + Sync {
    /// Fetch a single position.
    fn current_position(
        &self,
        options: FetchOptions,
    ) -> BoxFuture<'_, Result<LocationSample, LocationError>>;

    /// Start a continuous watch.
    ///
    /// The watch ends when the returned receiver is dropped or the provider
    /// closes the channel.
    fn watch(&self, options: WatchOptions) -> Result<WatchStream, LocationError>;
}
