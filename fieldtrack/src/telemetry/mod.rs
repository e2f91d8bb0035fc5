//! Tracking telemetry for observability.
//!
//! Lock-free atomic counters updated from the sampling, geofence and upload
//! paths, with point-in-time snapshots for display.
//!
//! # Architecture
//!
//! ```text
//! Sampler / Engine / Pipeline ─────► TrackingMetrics ─────► MetricsSnapshot ─────► Views
//!                                    (atomic counters)      (point-in-time copy)   (CLI, logs)
//! ```
//!
//! # Example
//!
//! ```
//! use fieldtrack::telemetry::TrackingMetrics;
//!
//! let metrics = TrackingMetrics::new();
//! metrics.watch_sample();
//! metrics.upload_succeeded();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.samples_total(), 1);
//! assert_eq!(snapshot.uploads_succeeded, 1);
//! ```

mod metrics;
mod snapshot;

pub use metrics::TrackingMetrics;
pub use snapshot::MetricsSnapshot;
