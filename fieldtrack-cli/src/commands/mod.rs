//! CLI command implementations.

pub mod geofence;
pub mod resume;
pub mod simulate;
pub mod status;
