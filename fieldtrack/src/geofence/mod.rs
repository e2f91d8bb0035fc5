//! Geofence detection.
//!
//! Circular regions are evaluated against each incoming [`LocationSample`]
//! and a per-region membership state machine emits transition events.
//!
//! # State Machine
//!
//! ```text
//! OUTSIDE --[distance <= radius]--> INSIDE   (emits ENTER)
//! INSIDE  --[distance >  radius]--> OUTSIDE  (emits EXIT)
//! ```
//!
//! Regions flagged inactive are skipped entirely; their last known membership
//! is frozen rather than reset.
//!
//! [`LocationSample`]: crate::geo::LocationSample

mod engine;
mod event;
mod region;

pub use engine::{GeofenceEngine, Transition};
pub use event::{GeofenceEvent, GeofenceEventType};
pub use region::{GeofenceError, GeofenceRegion};
