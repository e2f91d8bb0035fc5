//! Atomic tracking counters.

use std::sync::atomic::{AtomicU64, Ordering};

use super::snapshot::MetricsSnapshot;

/// Counters shared by every component of one engine.
#[derive(Debug, Default)]
pub struct TrackingMetrics {
    watch_samples: AtomicU64,
    poll_samples: AtomicU64,
    samples_filtered: AtomicU64,
    location_errors: AtomicU64,
    uploads_succeeded: AtomicU64,
    uploads_failed: AtomicU64,
    flushes: AtomicU64,
    geofence_events: AtomicU64,
    events_reported: AtomicU64,
    event_report_failures: AtomicU64,
    persistence_failures: AtomicU64,
}

impl TrackingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A watch fix passed the movement filter.
    pub fn watch_sample(&self) {
        self.watch_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// The background poll produced a fix.
    pub fn poll_sample(&self) {
        self.poll_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// A watch fix was dropped by the movement filter.
    pub fn sample_filtered(&self) {
        self.samples_filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// A fetch or watch callback produced no sample.
    pub fn location_error(&self) {
        self.location_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upload_succeeded(&self) {
        self.uploads_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upload_failed(&self) {
        self.uploads_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A flush attempt started.
    pub fn flush_started(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn geofence_event(&self) {
        self.geofence_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_reported(&self) {
        self.events_reported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_report_failed(&self) {
        self.event_report_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A read or write against the state store failed.
    pub fn persistence_failed(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            watch_samples: self.watch_samples.load(Ordering::Relaxed),
            poll_samples: self.poll_samples.load(Ordering::Relaxed),
            samples_filtered: self.samples_filtered.load(Ordering::Relaxed),
            location_errors: self.location_errors.load(Ordering::Relaxed),
            uploads_succeeded: self.uploads_succeeded.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            geofence_events: self.geofence_events.load(Ordering::Relaxed),
            events_reported: self.events_reported.load(Ordering::Relaxed),
            event_report_failures: self.event_report_failures.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        assert_eq!(TrackingMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counters_increment_independently() {
        let metrics = TrackingMetrics::new();
        metrics.watch_sample();
        metrics.watch_sample();
        metrics.poll_sample();
        metrics.upload_failed();
        metrics.persistence_failed();

        let s = metrics.snapshot();
        assert_eq!(s.watch_samples, 2);
        assert_eq!(s.poll_samples, 1);
        assert_eq!(s.uploads_failed, 1);
        assert_eq!(s.uploads_succeeded, 0);
        assert_eq!(s.persistence_failures, 1);
    }
}
