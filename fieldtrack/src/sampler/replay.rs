//! Recorded-track location provider.
//!
//! Plays back a sequence of samples as if they came from the device. Each
//! sample is re-stamped with the wall-clock time at which it is emitted, and
//! the gaps between recorded timestamps are honoured (divided by `speedup`).
//!
//! Tracks are stored as JSON lines, one [`LocationSample`] per line.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::geo::{now_millis, LocationSample};
use crate::BoxFuture;

use super::provider::{FetchOptions, LocationError, LocationProvider, WatchOptions, WatchStream};

const WATCH_CHANNEL_CAPACITY: usize = 64;

/// Errors loading a recorded track.
#[derive(Debug, thiserror::Error)]
pub enum TrackLoadError {
    #[error("Failed to read track file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid sample on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse a JSON-lines track. Blank lines and lines starting with `#` are
/// skipped.
pub fn parse_track(contents: &str) -> Result<Vec<LocationSample>, TrackLoadError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| TrackLoadError::Parse {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

#[derive(Debug, Default)]
struct ReplayState {
    /// Most recent sample handed out, re-stamped.
    latest: Option<LocationSample>,
    /// Index of the next sample to emit.
    cursor: usize,
}

/// Location provider replaying a recorded track.
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    samples: Arc<Vec<LocationSample>>,
    speedup: f64,
    state: Arc<Mutex<ReplayState>>,
}

impl ReplayProvider {
    /// Create a provider over `samples`, replayed at `speedup` times real time.
    pub fn new(samples: Vec<LocationSample>, speedup: f64) -> Self {
        Self {
            samples: Arc::new(samples),
            speedup: if speedup.is_finite() && speedup > 0.0 {
                speedup
            } else {
                1.0
            },
            state: Arc::new(Mutex::new(ReplayState::default())),
        }
    }

    /// Load a JSON-lines track file.
    pub async fn from_file(path: impl AsRef<Path>, speedup: f64) -> Result<Self, TrackLoadError> {
        let contents = tokio::fs::read_to_string(path).await?;
        Ok(Self::new(parse_track(&contents)?, speedup))
    }

    /// Total samples in the track.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples emitted so far.
    pub fn emitted(&self) -> usize {
        self.state.lock().cursor
    }

    /// Whether every sample has been emitted.
    pub fn is_finished(&self) -> bool {
        self.emitted() >= self.samples.len()
    }

    fn gap_before(&self, index: usize) -> Duration {
        if index == 0 {
            return Duration::ZERO;
        }
        let delta_ms = self.samples[index].timestamp - self.samples[index - 1].timestamp;
        if delta_ms <= 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(delta_ms as f64 / 1000.0 / self.speedup)
    }

    /// Advance the cursor, returning the emitted (re-stamped) sample.
    fn advance(&self) -> Option<LocationSample> {
        let mut state = self.state.lock();
        let sample = self.samples.get(state.cursor)?.restamped(now_millis());
        state.cursor += 1;
        state.latest = Some(sample.clone());
        Some(sample)
    }
}

impl LocationProvider for ReplayProvider {
    fn current_position(
        &self,
        options: FetchOptions,
    ) -> BoxFuture<'_, Result<LocationSample, LocationError>> {
        Box::pin(async move {
            let latest = self.state.lock().latest.clone();
            let Some(sample) = latest else {
                return Err(LocationError::Unavailable(
                    "replay has not produced a fix yet".to_string(),
                ));
            };

            let age_ms = sample.age_ms(now_millis());
            let max_age_ms = options.max_age.as_millis() as u64;
            if age_ms > max_age_ms {
                return Err(LocationError::Stale { age_ms, max_age_ms });
            }
            Ok(sample)
        })
    }

    fn watch(&self, _options: WatchOptions) -> Result<WatchStream, LocationError> {
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        let replay = self.clone();

        tokio::spawn(async move {
            loop {
                let next = replay.emitted();
                if next >= replay.len() {
                    break;
                }
                tokio::time::sleep(replay.gap_before(next)).await;

                let Some(sample) = replay.advance() else { break };
                if tx.send(Ok(sample)).await.is_err() {
                    // Receiver dropped: watch cancelled
                    break;
                }
            }
            tracing::debug!(emitted = replay.emitted(), "Replay watch finished");
        });

        Ok(rx)
    }
}
