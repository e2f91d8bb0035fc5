//! Fire-and-forget delivery of geofence events.
//!
//! Dispatched events go through a single queue worker so the backend sees
//! them in the order they were produced.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::geofence::GeofenceEvent;
use crate::telemetry::TrackingMetrics;

use super::backend::{TrackingBackend, UploadError};

struct Sink {
    backend: Arc<dyn TrackingBackend>,
    metrics: Arc<TrackingMetrics>,
}

impl Sink {
    async fn report(&self, event: &GeofenceEvent) -> Result<(), UploadError> {
        match self.backend.record_geofence_event(event).await {
            Ok(()) => {
                self.metrics.event_reported();
                tracing::debug!(
                    region_id = %event.region_id,
                    event_type = %event.event_type,
                    "Geofence event reported"
                );
                Ok(())
            }
            Err(e) => {
                self.metrics.event_report_failed();
                tracing::warn!(
                    error = %e,
                    region_id = %event.region_id,
                    event_type = %event.event_type,
                    "Failed to report geofence event"
                );
                Err(e)
            }
        }
    }

    async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<GeofenceEvent>) {
        while let Some(event) = rx.recv().await {
            // Failure already logged and counted by `report`
            let _ = self.report(&event).await;
        }
    }
}

/// Forwards ENTER/EXIT events to the backend.
///
/// Failures are logged and counted; events are never retried.
#[derive(Clone)]
pub struct GeofenceEventReporter {
    sink: Arc<Sink>,
    queue: Arc<Mutex<Option<mpsc::UnboundedSender<GeofenceEvent>>>>,
}

impl std::fmt::Debug for GeofenceEventReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeofenceEventReporter").finish_non_exhaustive()
    }
}

impl GeofenceEventReporter {
    pub fn new(backend: Arc<dyn TrackingBackend>, metrics: Arc<TrackingMetrics>) -> Self {
        Self {
            sink: Arc::new(Sink { backend, metrics }),
            queue: Arc::new(Mutex::new(None)),
        }
    }

    /// Deliver one event and wait for the result.
    pub async fn report(&self, event: &GeofenceEvent) -> Result<(), UploadError> {
        self.sink.report(event).await
    }

    /// Queue for background delivery without waiting.
    ///
    /// The worker is spawned on first use, and again if the runtime that
    /// hosted the previous one has gone away.
    pub fn dispatch(&self, event: GeofenceEvent) {
        let mut queue = self.queue.lock();
        let event = match queue.as_ref() {
            Some(tx) => match tx.send(event) {
                Ok(()) => return,
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.sink.clone().run(rx));
        // Receiver is held by the worker just spawned
        let _ = tx.send(event);
        *queue = Some(tx);
    }
}
