//! Delivery of samples and geofence events to the backend.
//!
//! ```text
//! handle_sample ──► SampleBuffer (FIFO) ──[len >= capacity | stop]──► flush ──► TrackingBackend::record_location
//! GeofenceEngine ──► GeofenceEventReporter (fire-and-forget) ─────────────────► TrackingBackend::record_geofence_event
//! ```
//!
//! # Delivery Semantics
//!
//! Flushes upload buffered samples sequentially, one call per sample, in
//! arrival order. The first failure aborts the batch and leaves the failing
//! sample and everything after it in the buffer. Delivery is therefore
//! at-least-once: a sample whose upload reached the server but whose
//! response was lost is sent again on the next flush, and nothing here
//! deduplicates it.
//!
//! There is no retry timer. A failed flush is retried only when the next
//! trigger fires (capacity reached again, or tracking stops).

mod backend;
mod buffer;
mod http;
mod reporter;

pub use backend::{LogBackend, TrackingBackend, UploadError};
pub use buffer::{FlushOutcome, SampleBuffer};
pub use http::HttpBackend;
pub use reporter::GeofenceEventReporter;

#[cfg(test)]
pub(crate) use backend::tests::MockBackend;
