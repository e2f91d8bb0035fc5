//! Per-region membership state machine.

use std::collections::HashMap;

use crate::geo::LocationSample;

use super::event::GeofenceEventType;
use super::region::GeofenceRegion;

/// A membership change produced by evaluating one sample against one region.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub region_id: String,
    pub region_name: String,
    pub event_type: GeofenceEventType,
    pub distance_m: f64,
}

impl Transition {
    /// Membership value after this transition.
    pub fn is_inside(&self) -> bool {
        self.event_type == GeofenceEventType::Enter
    }
}

/// Evaluates samples against regions and tracks membership per region id.
///
/// Membership defaults to outside for any region without a recorded state.
/// The engine is purely in-memory and synchronous; callers persist the
/// membership bits carried by the returned [`Transition`]s.
#[derive(Debug, Default)]
pub struct GeofenceEngine {
    membership: HashMap<String, bool>,
}

impl GeofenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the membership of a region, typically from persisted state.
    pub fn restore(&mut self, region_id: impl Into<String>, inside: bool) {
        self.membership.insert(region_id.into(), inside);
    }

    /// Current membership of a region (false if unknown).
    pub fn is_inside(&self, region_id: &str) -> bool {
        self.membership.get(region_id).copied().unwrap_or(false)
    }

    /// Forget a region's membership.
    pub fn forget(&mut self, region_id: &str) {
        self.membership.remove(region_id);
    }

    /// Drop all membership state.
    pub fn clear(&mut self) {
        self.membership.clear();
    }

    /// Evaluate one sample against one region.
    ///
    /// Inactive regions are never evaluated and keep their membership.
    pub fn evaluate(
        &mut self,
        region: &GeofenceRegion,
        sample: &LocationSample,
    ) -> Option<Transition> {
        if !region.is_active() {
            return None;
        }

        let distance_m = region.distance_to(sample);
        let inside = distance_m <= region.radius();
        let was_inside = self.is_inside(region.id());

        let event_type = match (was_inside, inside) {
            (false, true) => GeofenceEventType::Enter,
            (true, false) => GeofenceEventType::Exit,
            _ => return None,
        };

        self.membership.insert(region.id().to_string(), inside);

        Some(Transition {
            region_id: region.id().to_string(),
            region_name: region.name().to_string(),
            event_type,
            distance_m,
        })
    }

    /// Evaluate one sample against every region, returning transitions in
    /// region order.
    pub fn evaluate_all<'a, I>(&mut self, regions: I, sample: &LocationSample) -> Vec<Transition>
    where
        I: IntoIterator<Item = &'a GeofenceRegion>,
    {
        regions
            .into_iter()
            .filter_map(|region| self.evaluate(region, sample))
            .collect()
    }
}
