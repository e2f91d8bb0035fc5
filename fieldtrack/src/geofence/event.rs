//! Geofence transition events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo::LocationSample;

/// Direction of a membership transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GeofenceEventType {
    /// The worker moved from outside to inside the region.
    Enter,
    /// The worker moved from inside to outside the region.
    Exit,
}

impl GeofenceEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeofenceEventType::Enter => "ENTER",
            GeofenceEventType::Exit => "EXIT",
        }
    }
}

impl fmt::Display for GeofenceEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A region transition ready to be reported to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceEvent {
    pub worker_id: String,
    pub region_id: String,
    pub region_name: String,
    pub event_type: GeofenceEventType,
    /// The sample that triggered the transition.
    pub location: LocationSample,
    /// Event time as epoch milliseconds.
    pub timestamp: i64,
    /// Distance from the region center at the time of the event, in meters.
    pub distance_m: f64,
}
