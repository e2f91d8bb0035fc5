//! CLI error types.

use std::fmt;

use fieldtrack::geofence::GeofenceError;
use fieldtrack::logging::LoggingError;
use fieldtrack::sampler::TrackLoadError;
use fieldtrack::store::StoreError;
use fieldtrack::upload::UploadError;
use fieldtrack::ConfigError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration file could not be loaded or is invalid.
    Config(ConfigError),

    /// Logging could not be initialized.
    Logging(LoggingError),

    /// Failed to create the Tokio runtime.
    Runtime(std::io::Error),

    /// Tracking state could not be read or written.
    Store(StoreError),

    /// The track file could not be loaded.
    Track(TrackLoadError),

    /// A geofence definition was rejected.
    Geofence(GeofenceError),

    /// The backend client could not be created.
    Backend(UploadError),

    /// Location permission was refused.
    PermissionDenied,

    /// No geofence with the given id.
    UnknownGeofence(String),

    /// The Ctrl+C handler could not be installed.
    Signal(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Logging(e) => write!(f, "{}", e),
            CliError::Runtime(e) => write!(f, "Failed to create Tokio runtime: {}", e),
            CliError::Store(e) => write!(f, "Tracking state error: {}", e),
            CliError::Track(e) => write!(f, "{}", e),
            CliError::Geofence(e) => write!(f, "Invalid geofence: {}", e),
            CliError::Backend(e) => write!(f, "Backend error: {}", e),
            CliError::PermissionDenied => write!(f, "Location permission denied"),
            CliError::UnknownGeofence(id) => write!(f, "No geofence with id '{}'", id),
            CliError::Signal(msg) => write!(f, "Failed to set signal handler: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Store(e) => Some(e),
            CliError::Track(e) => Some(e),
            CliError::Geofence(e) => Some(e),
            CliError::Backend(e) => Some(e),
            CliError::PermissionDenied | CliError::UnknownGeofence(_) | CliError::Signal(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}

impl From<TrackLoadError> for CliError {
    fn from(e: TrackLoadError) -> Self {
        CliError::Track(e)
    }
}

impl From<GeofenceError> for CliError {
    fn from(e: GeofenceError) -> Self {
        CliError::Geofence(e)
    }
}

impl From<UploadError> for CliError {
    fn from(e: UploadError) -> Self {
        CliError::Backend(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_unknown_geofence_display() {
        let err = CliError::UnknownGeofence("site-4".to_string());
        assert_eq!(err.to_string(), "No geofence with id 'site-4'");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_wrapped_error_keeps_source() {
        let err: CliError = UploadError::Transport("refused".to_string()).into();
        assert!(err.to_string().starts_with("Backend error:"));
        assert!(err.source().is_some());
    }
}
