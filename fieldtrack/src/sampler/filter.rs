//! Movement-based filtering for the continuous watch.

use std::time::Duration;

use crate::geo::LocationSample;

/// Decides which watch fixes are forwarded downstream.
///
/// - The first fix is always accepted.
/// - A fix is accepted when it moved at least `distance_filter_m` from the
///   last accepted fix and at least `min_interval` elapsed.
/// - A fix is accepted when `max_interval` elapsed, regardless of movement.
///
/// Elapsed time is measured on sample capture timestamps.
#[derive(Debug, Clone)]
pub struct MovementFilter {
    distance_filter_m: f64,
    min_interval_ms: i64,
    max_interval_ms: i64,
    last_accepted: Option<LocationSample>,
}

impl MovementFilter {
    pub fn new(distance_filter_m: f64, min_interval: Duration, max_interval: Duration) -> Self {
        Self {
            distance_filter_m,
            min_interval_ms: min_interval.as_millis() as i64,
            max_interval_ms: max_interval.as_millis() as i64,
            last_accepted: None,
        }
    }

    /// Returns true if `sample` should be forwarded, recording it as the new
    /// reference point.
    pub fn accept(&mut self, sample: &LocationSample) -> bool {
        let accepted = match &self.last_accepted {
            None => true,
            Some(last) => {
                let elapsed = sample.timestamp - last.timestamp;
                let moved = sample.distance_to(last);

                elapsed >= self.max_interval_ms
                    || (moved >= self.distance_filter_m && elapsed >= self.min_interval_ms)
            }
        };

        if accepted {
            self.last_accepted = Some(sample.clone());
        }
        accepted
    }
}
