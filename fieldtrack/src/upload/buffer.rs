//! Bounded FIFO of samples awaiting upload.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::geo::LocationSample;
use crate::telemetry::TrackingMetrics;

use super::backend::{TrackingBackend, UploadError};

#[derive(Debug, Clone)]
struct BufferedSample {
    worker_id: Arc<str>,
    sample: LocationSample,
}

/// Result of one flush attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushOutcome {
    /// Samples confirmed by the backend and removed from the buffer.
    pub sent: usize,
    /// Samples left in the buffer afterwards.
    pub retained: usize,
    /// The failure that aborted the batch, if any.
    pub error: Option<UploadError>,
}

impl FlushOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// FIFO buffer decoupling sampling from network delivery.
///
/// Reaching `capacity` is the flush trigger; the buffer only holds more than
/// `capacity` samples while a failed flush's remainder is waiting for the
/// next trigger.
///
/// Flushes are serialized. Samples are removed one at a time as their upload
/// succeeds, so pushes may continue concurrently and an interrupted flush
/// never loses data.
#[derive(Debug)]
pub struct SampleBuffer {
    capacity: usize,
    queue: Mutex<VecDeque<BufferedSample>>,
    flush_lock: tokio::sync::Mutex<()>,
}

impl SampleBuffer {
    /// Create a buffer; a capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            flush_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Append a sample. Returns true if the buffer reached capacity and a
    /// flush should be triggered.
    pub fn push(&self, worker_id: &str, sample: LocationSample) -> bool {
        let mut queue = self.queue.lock();
        queue.push_back(BufferedSample {
            worker_id: Arc::from(worker_id),
            sample,
        });
        queue.len() >= self.capacity
    }

    /// Copy of the buffered samples in FIFO order.
    pub fn samples(&self) -> Vec<LocationSample> {
        self.queue.lock().iter().map(|b| b.sample.clone()).collect()
    }

    /// Flush, waiting for any in-flight flush to finish first.
    pub async fn flush(
        &self,
        backend: &dyn TrackingBackend,
        metrics: &TrackingMetrics,
    ) -> FlushOutcome {
        let _guard = self.flush_lock.lock().await;
        self.flush_locked(backend, metrics).await
    }

    /// Flush unless another flush is already running.
    ///
    /// Returns `None` when skipped; the running flush or the next trigger
    /// picks the samples up.
    pub async fn try_flush(
        &self,
        backend: &dyn TrackingBackend,
        metrics: &TrackingMetrics,
    ) -> Option<FlushOutcome> {
        let Ok(_guard) = self.flush_lock.try_lock() else {
            debug!("Flush already in progress, skipping trigger");
            return None;
        };
        Some(self.flush_locked(backend, metrics).await)
    }

    async fn flush_locked(
        &self,
        backend: &dyn TrackingBackend,
        metrics: &TrackingMetrics,
    ) -> FlushOutcome {
        // Only the flush holder removes entries, and pushes only append, so
        // the batch is always a prefix of the queue.
        let batch: Vec<BufferedSample> = self.queue.lock().iter().cloned().collect();
        if batch.is_empty() {
            return FlushOutcome {
                sent: 0,
                retained: 0,
                error: None,
            };
        }

        metrics.flush_started();
        let mut sent = 0;

        for item in &batch {
            match backend.record_location(&item.worker_id, &item.sample).await {
                Ok(()) => {
                    self.queue.lock().pop_front();
                    metrics.upload_succeeded();
                    sent += 1;
                }
                Err(e) => {
                    metrics.upload_failed();
                    let retained = self.len();
                    warn!(
                        error = %e,
                        sent,
                        retained,
                        "Sample upload failed, keeping remainder for next flush"
                    );
                    return FlushOutcome {
                        sent,
                        retained,
                        error: Some(e),
                    };
                }
            }
        }

        let retained = self.len();
        debug!(sent, retained, "Sample buffer flushed");
        FlushOutcome {
            sent,
            retained,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::MockBackend;

    fn sample(i: i64) -> LocationSample {
        LocationSample::at(53.0 + i as f64 * 0.001, 10.0, 5.0, i)
    }

    #[test]
    fn test_push_signals_at_capacity() {
        let buffer = SampleBuffer::new(3);
        assert!(!buffer.push("w", sample(0)));
        assert!(!buffer.push("w", sample(1)));
        assert!(buffer.push("w", sample(2)));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_zero_capacity_is_one() {
        let buffer = SampleBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        assert!(buffer.push("w", sample(0)));
    }

    #[tokio::test]
    async fn test_flush_sends_in_fifo_order_and_empties() {
        let buffer = SampleBuffer::new(10);
        let backend = MockBackend::default();
        let metrics = TrackingMetrics::new();
        for i in 0..4 {
            buffer.push("w-1", sample(i));
        }

        let outcome = buffer.flush(&backend, &metrics).await;

        assert_eq!(outcome, FlushOutcome { sent: 4, retained: 0, error: None });
        assert!(buffer.is_empty());
        let sent: Vec<i64> = backend.locations.lock().iter().map(|(_, s)| s.timestamp).collect();
        assert_eq!(sent, vec![0, 1, 2, 3]);
        assert!(backend.locations.lock().iter().all(|(w, _)| w == "w-1"));
        assert_eq!(metrics.snapshot().uploads_succeeded, 4);
        assert_eq!(metrics.snapshot().flushes, 1);
    }

    #[tokio::test]
    async fn test_offline_flush_retains_everything() {
        let buffer = SampleBuffer::new(3);
        let backend = MockBackend::offline();
        let metrics = TrackingMetrics::new();
        let samples: Vec<_> = (0..3).map(sample).collect();
        for s in &samples {
            buffer.push("w", s.clone());
        }

        let outcome = buffer.flush(&backend, &metrics).await;

        assert_eq!(outcome.sent, 0);
        assert_eq!(outcome.retained, 3);
        assert!(!outcome.is_success());
        assert_eq!(buffer.samples(), samples);
        // Aborted after the first failure
        assert_eq!(metrics.snapshot().uploads_failed, 1);
    }

    #[tokio::test]
    async fn test_partial_failure_retains_from_failing_sample() {
        let buffer = SampleBuffer::new(10);
        let backend = MockBackend::failing_after(2);
        let metrics = TrackingMetrics::new();
        for i in 0..5 {
            buffer.push("w", sample(i));
        }

        let outcome = buffer.flush(&backend, &metrics).await;

        assert_eq!(outcome.sent, 2);
        assert_eq!(outcome.retained, 3);
        let remaining: Vec<i64> = buffer.samples().iter().map(|s| s.timestamp).collect();
        assert_eq!(remaining, vec![2, 3, 4]);

        backend.set_online();
        let outcome = buffer.flush(&backend, &metrics).await;
        assert_eq!(outcome.sent, 3);
        assert!(buffer.is_empty());

        let delivered: Vec<i64> = backend.locations.lock().iter().map(|(_, s)| s.timestamp).collect();
        assert_eq!(delivered, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_empty_flush_is_noop() {
        let buffer = SampleBuffer::new(3);
        let metrics = TrackingMetrics::new();
        let outcome = buffer.flush(&MockBackend::default(), &metrics).await;
        assert_eq!(outcome.sent, 0);
        assert_eq!(metrics.snapshot().flushes, 0);
    }

    #[tokio::test]
    async fn test_try_flush_skips_when_busy() {
        let buffer = SampleBuffer::new(3);
        buffer.push("w", sample(0));
        let metrics = TrackingMetrics::new();

        let guard = buffer.flush_lock.lock().await;
        assert!(buffer.try_flush(&MockBackend::default(), &metrics).await.is_none());
        drop(guard);

        let outcome = buffer.try_flush(&MockBackend::default(), &metrics).await.unwrap();
        assert_eq!(outcome.sent, 1);
    }
}
