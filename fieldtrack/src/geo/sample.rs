//! Device position samples.

use serde::{Deserialize, Serialize};

use super::haversine_distance;

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A single position fix captured from the device.
///
/// Samples are immutable once captured. Optional fields are omitted from the
/// serialized form when the platform did not report them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Horizontal accuracy in meters.
    pub accuracy: f64,
    /// Altitude in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Heading in degrees (0 = North).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// Ground speed in meters per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Capture time as epoch milliseconds.
    pub timestamp: i64,
    /// Battery level (0-100) at capture time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u8>,
}

impl LocationSample {
    /// Create a sample captured now with only the required fields.
    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self::at(latitude, longitude, accuracy, now_millis())
    }

    /// Create a sample with an explicit capture timestamp.
    pub fn at(latitude: f64, longitude: f64, accuracy: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            altitude: None,
            heading: None,
            speed: None,
            timestamp,
            battery_level: None,
        }
    }

    /// Set the altitude.
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Set heading and speed.
    pub fn with_motion(mut self, heading: f64, speed: f64) -> Self {
        self.heading = Some(heading);
        self.speed = Some(speed);
        self
    }

    /// Set the battery level, clamped to 0-100.
    pub fn with_battery_level(mut self, level: u8) -> Self {
        self.battery_level = Some(level.min(100));
        self
    }

    /// Return a copy of this sample re-stamped with a new capture time.
    pub fn restamped(&self, timestamp: i64) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }

    /// Distance in meters to another sample.
    pub fn distance_to(&self, other: &LocationSample) -> f64 {
        haversine_distance(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }

    /// Age of this sample in milliseconds relative to `now_ms`.
    ///
    /// Samples stamped in the future report an age of zero.
    pub fn age_ms(&self, now_ms: i64) -> u64 {
        now_ms.saturating_sub(self.timestamp).max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_form_uses_camel_case_and_skips_missing() {
        let sample = LocationSample::at(53.5, 10.0, 5.0, 1_700_000_000_000).with_battery_level(80);
        let json = serde_json::to_value(&sample).unwrap();

        assert_eq!(json["batteryLevel"], 80);
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
        assert!(json.get("altitude").is_none());
        assert!(json.get("heading").is_none());
    }

    #[test]
    fn test_deserialize_minimal_sample() {
        let json = r#"{"latitude":1.5,"longitude":2.5,"accuracy":3.0,"timestamp":42}"#;
        let sample: LocationSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample, LocationSample::at(1.5, 2.5, 3.0, 42));
    }

    #[test]
    fn test_battery_level_is_clamped() {
        let sample = LocationSample::at(0.0, 0.0, 1.0, 0).with_battery_level(250);
        assert_eq!(sample.battery_level, Some(100));
    }

    #[test]
    fn test_age_ms() {
        let sample = LocationSample::at(0.0, 0.0, 1.0, 1_000);
        assert_eq!(sample.age_ms(4_500), 3_500);
        assert_eq!(sample.age_ms(500), 0);
    }

    #[test]
    fn test_restamped_keeps_position() {
        let sample = LocationSample::at(10.0, 20.0, 3.0, 1).with_motion(90.0, 1.5);
        let copy = sample.restamped(99);
        assert_eq!(copy.timestamp, 99);
        assert_eq!(copy.latitude, 10.0);
        assert_eq!(copy.heading, Some(90.0));
    }
}
