//! Engine configuration.
//!
//! [`TrackingConfig`] combines the settings of every component. Each part has
//! defaults matching typical field-device behaviour and `with_*` builder
//! methods. A config can also be loaded from an INI file:
//!
//! ```ini
//! [sampler]
//! distance_filter_m = 10
//! min_interval_secs = 5
//! max_interval_secs = 60
//! poll_interval_secs = 30
//! fetch_timeout_secs = 15
//! max_age_secs = 10
//!
//! [buffer]
//! capacity = 50
//!
//! [backend]
//! url = https://api.example.com
//! timeout_secs = 30
//!
//! [storage]
//! data_dir = /var/lib/fieldtrack
//! ```
//!
//! Missing sections and keys fall back to defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

/// Default movement threshold for the continuous watch, in meters.
pub const DEFAULT_DISTANCE_FILTER_M: f64 = 10.0;
/// Default minimum time between watch fixes.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(5);
/// Default maximum time between watch fixes.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);
/// Default background poll period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Default one-shot fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);
/// Default staleness tolerance for a cached fix.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10);
/// Default sample buffer capacity.
pub const DEFAULT_BUFFER_CAPACITY: usize = 50;
/// Default HTTP request timeout.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or parsed as INI.
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    /// A value is present but unusable.
    #[error("Invalid value for [{section}] {key} = {value:?}: {reason}")]
    Invalid {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Location sampling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Minimum movement between watch fixes, in meters.
    pub distance_filter_m: f64,
    /// Minimum time between watch fixes.
    pub min_interval: Duration,
    /// Maximum time between watch fixes; a fix is taken even when stationary.
    pub max_interval: Duration,
    /// Background poll period.
    pub poll_interval: Duration,
    /// Timeout for a one-shot fetch.
    pub fetch_timeout: Duration,
    /// A cached fix younger than this is acceptable.
    pub max_age: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            distance_filter_m: DEFAULT_DISTANCE_FILTER_M,
            min_interval: DEFAULT_MIN_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

impl SamplerConfig {
    pub fn with_distance_filter(mut self, meters: f64) -> Self {
        self.distance_filter_m = meters;
        self
    }

    pub fn with_intervals(mut self, min: Duration, max: Duration) -> Self {
        self.min_interval = min;
        self.max_interval = max;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }
}

/// Sample buffer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// Number of samples that triggers a flush.
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Base URL of the tracking API. `None` means log-only delivery.
    pub base_url: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory for persisted tracking state.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Default data directory: `<data dir>/fieldtrack`, or `./fieldtrack-data`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("fieldtrack"))
        .unwrap_or_else(|| PathBuf::from("fieldtrack-data"))
}

/// Default config file: `<config dir>/fieldtrack/config.ini`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fieldtrack").join("config.ini"))
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingConfig {
    pub sampler: SamplerConfig,
    pub buffer: BufferConfig,
    pub backend: BackendConfig,
    pub storage: StorageConfig,
}

impl TrackingConfig {
    pub fn with_sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer.capacity = capacity;
        self
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend.base_url = Some(url.into());
        self
    }

    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.storage.data_dir = dir;
        self
    }

    /// Load from an INI file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Load from an INI file if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<inline>"),
            source: ini::Error::Parse(e),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(s) = ini.section(Some("sampler")) {
            let c = &mut config.sampler;
            c.distance_filter_m = parse_or(s, "sampler", "distance_filter_m", c.distance_filter_m)?;
            c.min_interval = secs_or(s, "sampler", "min_interval_secs", c.min_interval)?;
            c.max_interval = secs_or(s, "sampler", "max_interval_secs", c.max_interval)?;
            c.poll_interval = secs_or(s, "sampler", "poll_interval_secs", c.poll_interval)?;
            c.fetch_timeout = secs_or(s, "sampler", "fetch_timeout_secs", c.fetch_timeout)?;
            c.max_age = secs_or(s, "sampler", "max_age_secs", c.max_age)?;
        }

        if let Some(s) = ini.section(Some("buffer")) {
            config.buffer.capacity = parse_or(s, "buffer", "capacity", config.buffer.capacity)?;
        }

        if let Some(s) = ini.section(Some("backend")) {
            if let Some(url) = s.get("url").map(str::trim).filter(|u| !u.is_empty()) {
                config.backend.base_url = Some(url.to_string());
            }
            config.backend.timeout = secs_or(s, "backend", "timeout_secs", config.backend.timeout)?;
        }

        if let Some(s) = ini.section(Some("storage")) {
            if let Some(dir) = s.get("data_dir").map(str::trim).filter(|d| !d.is_empty()) {
                config.storage.data_dir = PathBuf::from(dir);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |section: &str, key: &str, value: String, reason: &str| ConfigError::Invalid {
            section: section.to_string(),
            key: key.to_string(),
            value,
            reason: reason.to_string(),
        };

        if self.buffer.capacity == 0 {
            return Err(invalid("buffer", "capacity", "0".into(), "must be at least 1"));
        }
        if !self.sampler.distance_filter_m.is_finite() || self.sampler.distance_filter_m < 0.0 {
            return Err(invalid(
                "sampler",
                "distance_filter_m",
                self.sampler.distance_filter_m.to_string(),
                "must be a non-negative number",
            ));
        }
        if self.sampler.poll_interval.is_zero() {
            return Err(invalid("sampler", "poll_interval_secs", "0".into(), "must be positive"));
        }
        if self.sampler.min_interval > self.sampler.max_interval {
            return Err(invalid(
                "sampler",
                "min_interval_secs",
                self.sampler.min_interval.as_secs().to_string(),
                "must not exceed max_interval_secs",
            ));
        }
        Ok(())
    }
}

fn parse_or<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match props.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            section: section.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn secs_or(
    props: &Properties,
    section: &str,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse_or(props, section, key, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TrackingConfig::default();
        assert_eq!(config.sampler.distance_filter_m, 10.0);
        assert_eq!(config.sampler.poll_interval, Duration::from_secs(30));
        assert_eq!(config.sampler.max_age, Duration::from_secs(10));
        assert_eq!(config.buffer.capacity, 50);
        assert!(config.backend.base_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = TrackingConfig::default()
            .with_buffer_capacity(3)
            .with_backend_url("https://api.example.com")
            .with_data_dir(PathBuf::from("/tmp/ft"))
            .with_sampler(SamplerConfig::default().with_poll_interval(Duration::from_secs(5)));

        assert_eq!(config.buffer.capacity, 3);
        assert_eq!(config.backend.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/ft"));
        assert_eq!(config.sampler.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_partial_ini_keeps_defaults() {
        let config = TrackingConfig::from_ini_str(
            "[buffer]\ncapacity = 3\n\n[backend]\nurl = http://localhost:8080\n",
        )
        .unwrap();

        assert_eq!(config.buffer.capacity, 3);
        assert_eq!(config.backend.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.sampler, SamplerConfig::default());
    }

    #[test]
    fn test_full_sampler_section() {
        let config = TrackingConfig::from_ini_str(
            "[sampler]\n\
             distance_filter_m = 25.5\n\
             min_interval_secs = 2\n\
             max_interval_secs = 120\n\
             poll_interval_secs = 15\n\
             fetch_timeout_secs = 12\n\
             max_age_secs = 8\n",
        )
        .unwrap();

        let s = config.sampler;
        assert_eq!(s.distance_filter_m, 25.5);
        assert_eq!(s.min_interval, Duration::from_secs(2));
        assert_eq!(s.max_interval, Duration::from_secs(120));
        assert_eq!(s.poll_interval, Duration::from_secs(15));
        assert_eq!(s.fetch_timeout, Duration::from_secs(12));
        assert_eq!(s.max_age, Duration::from_secs(8));
    }

    #[test]
    fn test_malformed_value_is_invalid() {
        let err = TrackingConfig::from_ini_str("[buffer]\ncapacity = lots\n").unwrap_err();
        match err {
            ConfigError::Invalid { section, key, .. } => {
                assert_eq!(section, "buffer");
                assert_eq!(key, "capacity");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(TrackingConfig::from_ini_str("[buffer]\ncapacity = 0\n").is_err());
    }

    #[test]
    fn test_min_interval_above_max_rejected() {
        let err = TrackingConfig::from_ini_str(
            "[sampler]\nmin_interval_secs = 90\nmax_interval_secs = 60\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("min_interval_secs"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\ndata_dir = /srv/fieldtrack").unwrap();

        let config = TrackingConfig::load(file.path()).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/srv/fieldtrack"));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = TrackingConfig::load_or_default(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config.buffer, BufferConfig::default());
    }
}
