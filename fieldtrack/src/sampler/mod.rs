//! Location sampling.
//!
//! Produces a live stream of [`LocationSample`]s from two concurrent paths
//! that feed the same [`SampleHandler`]:
//!
//! ```text
//! LocationProvider::watch ──► MovementFilter ──┐
//!                                              ├──► SampleHandler::handle_sample
//! Scheduler (every poll_interval) ─► fetch ────┘
//! ```
//!
//! The watch follows movement in the foreground; the periodic poll keeps
//! sampling while the host is in the background. The two paths are not
//! deduplicated against each other.
//!
//! Fetch failures never reach the caller of [`LocationSampler::start`]: they
//! are logged, counted, and the next cycle proceeds.

mod filter;
mod provider;
mod replay;

pub use filter::MovementFilter;
pub use provider::{FetchOptions, LocationError, LocationProvider, WatchOptions, WatchStream};
pub use replay::{parse_track, ReplayProvider, TrackLoadError};

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SamplerConfig;
use crate::geo::{now_millis, LocationSample};
use crate::scheduler::{PeriodicCallback, Scheduler, TaskId};
use crate::telemetry::TrackingMetrics;
use crate::BoxFuture;

/// Receives every sample produced by either acquisition path.
pub trait SampleHandler: Send + Sync + 'static {
    fn handle_sample<'a>(&'a self, sample: LocationSample, worker_id: &'a str)
        -> BoxFuture<'a, ()>;
}

/// Fetch one position with the configured timeout and staleness tolerance.
pub async fn fetch_position(
    provider: &dyn LocationProvider,
    config: &SamplerConfig,
) -> Result<LocationSample, LocationError> {
    let options = FetchOptions {
        timeout: config.fetch_timeout,
        max_age: config.max_age,
    };

    let sample = tokio::time::timeout(config.fetch_timeout, provider.current_position(options))
        .await
        .map_err(|_| LocationError::Timeout(config.fetch_timeout))??;

    let age_ms = sample.age_ms(now_millis());
    let max_age_ms = config.max_age.as_millis() as u64;
    if age_ms > max_age_ms {
        return Err(LocationError::Stale { age_ms, max_age_ms });
    }

    Ok(sample)
}

/// Drives the watch and poll acquisition paths.
pub struct LocationSampler {
    config: SamplerConfig,
    provider: Arc<dyn LocationProvider>,
    scheduler: Arc<dyn Scheduler>,
    metrics: Arc<TrackingMetrics>,
}

impl std::fmt::Debug for LocationSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationSampler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LocationSampler {
    pub fn new(
        config: SamplerConfig,
        provider: Arc<dyn LocationProvider>,
        scheduler: Arc<dyn Scheduler>,
        metrics: Arc<TrackingMetrics>,
    ) -> Self {
        Self {
            config,
            provider,
            scheduler,
            metrics,
        }
    }

    /// Start both acquisition paths for `worker_id`.
    ///
    /// If the provider refuses to start a watch, sampling continues on the
    /// periodic poll alone.
    pub fn start(&self, worker_id: &str, handler: Arc<dyn SampleHandler>) -> SamplerHandle {
        let cancel = CancellationToken::new();
        let delivery = Delivery {
            handler,
            cancel: cancel.clone(),
            gate: Arc::new(tokio::sync::Mutex::new(())),
        };

        let watch_task = match self.provider.watch(WatchOptions {
            distance_filter_m: self.config.distance_filter_m,
            min_interval: self.config.min_interval,
        }) {
            Ok(stream) => Some(self.spawn_watch(stream, worker_id, delivery.clone())),
            Err(e) => {
                warn!(error = %e, "Continuous watch unavailable, relying on periodic poll");
                self.metrics.location_error();
                None
            }
        };

        let poll_task = self.scheduler.register_periodic(
            "location-poll",
            self.config.poll_interval,
            self.poll_callback(worker_id, delivery.clone()),
        );

        info!(
            worker_id,
            watch = watch_task.is_some(),
            poll_interval_secs = self.config.poll_interval.as_secs(),
            distance_filter_m = self.config.distance_filter_m,
            "Location sampling started"
        );

        SamplerHandle {
            cancel,
            gate: delivery.gate,
            poll_task,
            scheduler: Arc::clone(&self.scheduler),
            watch_task,
        }
    }

    fn spawn_watch(
        &self,
        mut stream: WatchStream,
        worker_id: &str,
        delivery: Delivery,
    ) -> JoinHandle<()> {
        let mut filter = MovementFilter::new(
            self.config.distance_filter_m,
            self.config.min_interval,
            self.config.max_interval,
        );
        let metrics = Arc::clone(&self.metrics);
        let worker_id = worker_id.to_string();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    _ = delivery.cancel.cancelled() => break,

                    item = stream.recv() => {
                        let Some(item) = item else {
                            info!("Location watch ended");
                            break;
                        };

                        match item {
                            Ok(sample) if filter.accept(&sample) => {
                                if delivery.deliver(sample, &worker_id).await {
                                    metrics.watch_sample();
                                }
                            }
                            Ok(_) => metrics.sample_filtered(),
                            Err(e) => {
                                warn!(error = %e, "Location watch error, skipping fix");
                                metrics.location_error();
                            }
                        }
                    }
                }
            }
            debug!("Location watch task stopped");
        })
    }

    fn poll_callback(&self, worker_id: &str, delivery: Delivery) -> PeriodicCallback {
        let provider = Arc::clone(&self.provider);
        let config = self.config.clone();
        let metrics = Arc::clone(&self.metrics);
        let worker_id: Arc<str> = Arc::from(worker_id);

        Arc::new(move || {
            let provider = Arc::clone(&provider);
            let config = config.clone();
            let metrics = Arc::clone(&metrics);
            let delivery = delivery.clone();
            let worker_id = Arc::clone(&worker_id);

            Box::pin(async move {
                if delivery.cancel.is_cancelled() {
                    return;
                }
                match fetch_position(provider.as_ref(), &config).await {
                    Ok(sample) => {
                        if delivery.deliver(sample, &worker_id).await {
                            metrics.poll_sample();
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Background location poll produced no sample");
                        metrics.location_error();
                    }
                }
            })
        })
    }
}

/// Hands samples from both paths to the handler one at a time.
///
/// The gate serializes delivery, and a sample is dropped once sampling has
/// been cancelled, so nothing reaches the handler after [`SamplerHandle::stop`]
/// returns.
#[derive(Clone)]
struct Delivery {
    handler: Arc<dyn SampleHandler>,
    cancel: CancellationToken,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl Delivery {
    /// Returns false if the sample was dropped because sampling stopped.
    async fn deliver(&self, sample: LocationSample, worker_id: &str) -> bool {
        let _gate = self.gate.lock().await;
        if self.cancel.is_cancelled() {
            debug!("Sampling stopped, dropping fix");
            return false;
        }
        self.handler.handle_sample(sample, worker_id).await;
        true
    }
}

/// Running sampler; dropping it does not stop sampling, call [`stop`].
///
/// [`stop`]: SamplerHandle::stop
pub struct SamplerHandle {
    cancel: CancellationToken,
    gate: Arc<tokio::sync::Mutex<()>>,
    poll_task: TaskId,
    scheduler: Arc<dyn Scheduler>,
    watch_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SamplerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplerHandle")
            .field("poll_task", &self.poll_task)
            .field("watching", &self.watch_task.is_some())
            .finish_non_exhaustive()
    }
}

impl SamplerHandle {
    /// Whether the continuous watch was started.
    pub fn has_watch(&self) -> bool {
        self.watch_task.is_some()
    }

    /// Cancel both paths and wait for a sample already being handled.
    ///
    /// Once this returns the handler is not called again.
    pub async fn stop(self) {
        self.cancel.cancel();
        self.scheduler.cancel(self.poll_task);

        if let Some(task) = self.watch_task {
            if let Err(e) = task.await {
                warn!(error = %e, "Location watch task failed");
            }
        }
        // An in-flight poll delivery holds the gate
        drop(self.gate.lock().await);

        debug!(poll_task = %self.poll_task, "Location sampling stopped");
    }
}
