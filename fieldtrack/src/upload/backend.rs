//! Backend capability and errors.

use thiserror::Error;

use crate::geo::LocationSample;
use crate::geofence::GeofenceEvent;
use crate::BoxFuture;

/// Errors delivering data to the backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UploadError {
    /// The request could not be sent or no response was received.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The payload could not be encoded.
    #[error("Failed to encode payload: {0}")]
    Encode(String),
}

/// Backend operations consumed by the engine.
///
/// Request bodies are logical; the wire format belongs to the implementation.
pub trait TrackingBackend: Send + Sync {
    /// Record one location sample for a worker.
    fn record_location<'a>(
        &'a self,
        worker_id: &'a str,
        sample: &'a LocationSample,
    ) -> BoxFuture<'a, Result<(), UploadError>>;

    /// Record one geofence transition.
    fn record_geofence_event<'a>(
        &'a self,
        event: &'a GeofenceEvent,
    ) -> BoxFuture<'a, Result<(), UploadError>>;
}

/// Backend that only logs. Used for dry runs without a server.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogBackend;

impl TrackingBackend for LogBackend {
    fn record_location<'a>(
        &'a self,
        worker_id: &'a str,
        sample: &'a LocationSample,
    ) -> BoxFuture<'a, Result<(), UploadError>> {
        Box::pin(async move {
            tracing::info!(
                worker_id,
                latitude = sample.latitude,
                longitude = sample.longitude,
                accuracy = sample.accuracy,
                timestamp = sample.timestamp,
                "recordLocation"
            );
            Ok(())
        })
    }

    fn record_geofence_event<'a>(
        &'a self,
        event: &'a GeofenceEvent,
    ) -> BoxFuture<'a, Result<(), UploadError>> {
        Box::pin(async move {
            tracing::info!(
                worker_id = %event.worker_id,
                region_id = %event.region_id,
                event_type = %event.event_type,
                distance_m = event.distance_m,
                "recordGeofenceEvent"
            );
            Ok(())
        })
    }
}
