//! Point-in-time metrics snapshot.

use std::fmt;

/// Copy of [`TrackingMetrics`](super::TrackingMetrics) at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub watch_samples: u64,
    pub poll_samples: u64,
    pub samples_filtered: u64,
    pub location_errors: u64,
    pub uploads_succeeded: u64,
    pub uploads_failed: u64,
    pub flushes: u64,
    pub geofence_events: u64,
    pub events_reported: u64,
    pub event_report_failures: u64,
    pub persistence_failures: u64,
}

impl MetricsSnapshot {
    /// Samples handed downstream from either path.
    pub fn samples_total(&self) -> u64 {
        self.watch_samples + self.poll_samples
    }

    /// Fraction of upload calls that succeeded, 1.0 when none were made.
    pub fn upload_success_ratio(&self) -> f64 {
        let total = self.uploads_succeeded + self.uploads_failed;
        if total == 0 {
            1.0
        } else {
            self.uploads_succeeded as f64 / total as f64
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "samples: {} (watch {}, poll {}, filtered {}), location errors: {}, \
             uploads: {} ok / {} failed in {} flushes, geofence events: {} ({} reported, {} failed), \
             persistence failures: {}",
            self.samples_total(),
            self.watch_samples,
            self.poll_samples,
            self.samples_filtered,
            self.location_errors,
            self.uploads_succeeded,
            self.uploads_failed,
            self.flushes,
            self.geofence_events,
            self.events_reported,
            self.event_report_failures,
            self.persistence_failures,
        )
    }
}
