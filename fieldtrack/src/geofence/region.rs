//! Circular geofence regions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{haversine_distance, is_valid_coordinate, LocationSample};

/// Errors raised when constructing a region.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeofenceError {
    /// Radius must be a finite value greater than zero.
    #[error("Invalid radius for region '{id}': {radius} m (must be > 0)")]
    InvalidRadius { id: String, radius: f64 },

    /// Center is not a valid latitude/longitude.
    #[error("Invalid center for region '{id}': ({latitude}, {longitude})")]
    InvalidCenter {
        id: String,
        latitude: f64,
        longitude: f64,
    },

    /// Region id is empty.
    #[error("Region id must not be empty")]
    EmptyId,
}

/// Raw serialized form, validated on conversion.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRegion {
    id: String,
    name: String,
    latitude: f64,
    longitude: f64,
    radius: f64,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

impl TryFrom<RawRegion> for GeofenceRegion {
    type Error = GeofenceError;

    fn try_from(raw: RawRegion) -> Result<Self, Self::Error> {
        GeofenceRegion::new(raw.id, raw.name, raw.latitude, raw.longitude, raw.radius)
            .map(|region| region.with_active(raw.active))
    }
}

/// A named circular area used to detect entry and exit.
///
/// Regions are authored externally; the engine only reads and stores them.
/// The radius is guaranteed to be positive for every constructed value,
/// including ones loaded from persisted JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawRegion")]
pub struct GeofenceRegion {
    id: String,
    name: String,
    latitude: f64,
    longitude: f64,
    radius: f64,
    active: bool,
}

impl GeofenceRegion {
    /// Create an active region.
    ///
    /// # Errors
    ///
    /// Returns `GeofenceError` if the id is empty, the center is not a valid
    /// coordinate, or the radius is not strictly positive.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        radius: f64,
    ) -> Result<Self, GeofenceError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(GeofenceError::EmptyId);
        }
        if !is_valid_coordinate(latitude, longitude) {
            return Err(GeofenceError::InvalidCenter {
                id,
                latitude,
                longitude,
            });
        }
        if !radius.is_finite() || radius <= 0.0 {
            return Err(GeofenceError::InvalidRadius { id, radius });
        }

        Ok(Self {
            id,
            name: name.into(),
            latitude,
            longitude,
            radius,
            active: true,
        })
    }

    /// Set the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Radius in meters, always > 0.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Distance in meters from the region center to a sample.
    pub fn distance_to(&self, sample: &LocationSample) -> f64 {
        haversine_distance(
            sample.latitude,
            sample.longitude,
            self.latitude,
            self.longitude,
        )
    }

    /// Whether a sample lies inside the region (boundary inclusive).
    pub fn contains(&self, sample: &LocationSample) -> bool {
        self.distance_to(sample) <= self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn nyc() -> GeofenceRegion {
        GeofenceRegion::new("nyc", "City Hall", 40.7128, -74.0060, 100.0).unwrap()
    }

    #[test]
    fn test_sample_near_center_is_inside() {
        let sample = LocationSample::at(40.7129, -74.0061, 5.0, 0);
        assert!(nyc().contains(&sample));
    }

    #[test]
    fn test_distant_sample_is_outside() {
        let sample = LocationSample::at(40.8000, -74.0000, 5.0, 0);
        assert!(!nyc().contains(&sample));
    }

    #[test]
    fn test_zero_radius_rejected() {
        let err = GeofenceRegion::new("a", "A", 0.0, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, GeofenceError::InvalidRadius { .. }));
    }

    #[test]
    fn test_negative_and_nan_radius_rejected() {
        assert!(GeofenceRegion::new("a", "A", 0.0, 0.0, -5.0).is_err());
        assert!(GeofenceRegion::new("a", "A", 0.0, 0.0, f64::NAN).is_err());
        assert!(GeofenceRegion::new("a", "A", 0.0, 0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_invalid_center_rejected() {
        let err = GeofenceRegion::new("a", "A", 91.0, 0.0, 10.0).unwrap_err();
        assert!(matches!(err, GeofenceError::InvalidCenter { .. }));
    }

    #[test]
    fn test_empty_id_rejected() {
        assert_eq!(
            GeofenceRegion::new("  ", "A", 0.0, 0.0, 10.0).unwrap_err(),
            GeofenceError::EmptyId
        );
    }

    #[test]
    fn test_deserialize_validates_radius() {
        let json = r#"{"id":"a","name":"A","latitude":0.0,"longitude":0.0,"radius":-1.0}"#;
        assert!(serde_json::from_str::<GeofenceRegion>(json).is_err());
    }

    #[test]
    fn test_deserialize_defaults_to_active() {
        let json = r#"{"id":"a","name":"A","latitude":1.0,"longitude":2.0,"radius":50.0}"#;
        let region: GeofenceRegion = serde_json::from_str(json).unwrap();
        assert!(region.is_active());
        assert_eq!(region.radius(), 50.0);
    }

    #[test]
    fn test_serialize_roundtrip_preserves_active_flag() {
        let region = nyc().with_active(false);
        let json = serde_json::to_string(&region).unwrap();
        let back: GeofenceRegion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, region);
        assert!(!back.is_active());
    }

    proptest! {
        #[test]
        fn prop_contains_matches_distance(
            lat in -80.0f64..80.0,
            lon in -170.0f64..170.0,
            dlat in -0.01f64..0.01,
            dlon in -0.01f64..0.01,
            radius in 1.0f64..2000.0,
        ) {
            let region = GeofenceRegion::new("r", "R", lat, lon, radius).unwrap();
            let sample = LocationSample::at(lat + dlat, lon + dlon, 1.0, 0);
            let distance = region.distance_to(&sample);
            prop_assert_eq!(region.contains(&sample), distance <= radius);
        }

        #[test]
        fn prop_center_is_always_inside(
            lat in -90.0f64..=90.0,
            lon in -180.0f64..=180.0,
            radius in 0.001f64..10_000.0,
        ) {
            let region = GeofenceRegion::new("r", "R", lat, lon, radius).unwrap();
            prop_assert!(region.contains(&LocationSample::at(lat, lon, 1.0, 0)));
        }
    }
}
