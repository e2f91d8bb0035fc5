//! Shared setup for commands: config, logging, runtime and storage.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fieldtrack::config::{default_config_path, SamplerConfig};
use fieldtrack::logging::{init_logging, LogConfig, WorkerGuard};
use fieldtrack::permission::StaticPermissionGate;
use fieldtrack::sampler::ReplayProvider;
use fieldtrack::scheduler::TokioScheduler;
use fieldtrack::store::{JsonFileStore, TrackingStateStore};
use fieldtrack::upload::{HttpBackend, LogBackend, TrackingBackend};
use fieldtrack::{TrackingComponents, TrackingConfig, TrackingEngine};
use tokio::runtime::Runtime;

use crate::error::CliError;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub verbose: bool,
}

/// Resolved configuration plus the runtime commands execute on.
pub struct CliRunner {
    config: TrackingConfig,
    runtime: Runtime,
    _log_guard: Option<WorkerGuard>,
}

impl CliRunner {
    pub fn new(options: &GlobalOptions) -> Result<Self, CliError> {
        let mut config = match options.config.as_deref() {
            Some(path) => TrackingConfig::load(path)?,
            None => match default_config_path() {
                Some(path) => TrackingConfig::load_or_default(&path)?,
                None => TrackingConfig::default(),
            },
        };
        if let Some(dir) = &options.data_dir {
            config = config.with_data_dir(dir.clone());
        }

        let log_guard = init_logging(&LogConfig {
            verbose: options.verbose,
            log_dir: Some(log_dir(&config.storage.data_dir)),
        })?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            config,
            runtime,
            _log_guard: log_guard,
        })
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn log_startup(&self, command: &str) {
        tracing::info!(
            command,
            version = env!("CARGO_PKG_VERSION"),
            data_dir = %self.config.storage.data_dir.display(),
            "FieldTrack CLI starting"
        );
    }

    /// Directory holding persisted tracking state.
    pub fn state_dir(&self) -> PathBuf {
        state_dir(&self.config.storage.data_dir)
    }

    pub async fn open_state(&self) -> Result<TrackingStateStore, CliError> {
        let store = JsonFileStore::open(self.state_dir()).await?;
        Ok(TrackingStateStore::new(Arc::new(store)))
    }

    /// HTTP backend for `url_override` or the configured URL, otherwise a
    /// backend that only logs.
    pub fn backend(&self, url_override: Option<String>) -> Result<Arc<dyn TrackingBackend>, CliError> {
        match url_override.or_else(|| self.config.backend.base_url.clone()) {
            Some(url) => {
                let backend = HttpBackend::new(url, self.config.backend.timeout)?;
                tracing::info!(url = backend.base_url(), "Uploading to backend");
                Ok(Arc::new(backend))
            }
            None => {
                tracing::info!("No backend URL configured, logging uploads only");
                Ok(Arc::new(LogBackend))
            }
        }
    }

    /// Open an engine replaying `provider`, with sampler timings compressed
    /// by the replay speedup.
    pub async fn open_engine(
        &self,
        provider: ReplayProvider,
        speedup: f64,
        backend: Arc<dyn TrackingBackend>,
    ) -> Result<TrackingEngine, CliError> {
        let store = JsonFileStore::open(self.state_dir()).await?;
        let config = self
            .config
            .clone()
            .with_sampler(scaled_sampler(&self.config.sampler, speedup));

        Ok(TrackingEngine::open(
            config,
            TrackingComponents {
                store: Arc::new(store),
                provider: Arc::new(provider),
                scheduler: Arc::new(TokioScheduler::new()),
                backend,
                permissions: Arc::new(StaticPermissionGate::granted()),
            },
        )
        .await)
    }
}

fn state_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("state")
}

fn log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// Shortest interval a speedup can scale down to.
const MIN_SCALED_INTERVAL: Duration = Duration::from_millis(1);

/// Divide every sampler interval by `speedup`, never below one millisecond.
/// Replayed fixes are stamped with wall-clock time, so unscaled intervals
/// would filter most of them.
pub fn scaled_sampler(sampler: &SamplerConfig, speedup: f64) -> SamplerConfig {
    if !speedup.is_finite() || speedup <= 1.0 {
        return sampler.clone();
    }
    let scale = |interval: Duration| interval.div_f64(speedup).max(MIN_SCALED_INTERVAL);
    sampler
        .clone()
        .with_intervals(scale(sampler.min_interval), scale(sampler.max_interval))
        .with_poll_interval(scale(sampler.poll_interval))
}
