//! The tracking engine.
//!
//! [`TrackingEngine`] owns one tracking session and wires the components
//! together:
//!
//! ```text
//!                 ┌─────────────────┐
//! sampler ──────► │  handle_sample  │ ──► TrackingStateStore (last known)
//!                 └─────────────────┘
//!                    │           │
//!                    ▼           ▼
//!           GeofenceEngine    SampleBuffer ──(capacity)──► TrackingBackend
//!                    │
//!                    ├──► TrackingStateStore (membership)
//!                    ├──► broadcast subscribers
//!                    └──► GeofenceEventReporter ──► TrackingBackend
//! ```
//!
//! The engine is constructed once by the host and shared by cloning; clones
//! share all state.
//!
//! Persistence failures are logged and counted but never abort tracking.

mod session;

pub use session::TrackingSession;

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::TrackingConfig;
use crate::geo::{now_millis, LocationSample};
use crate::geofence::{GeofenceEngine, GeofenceEvent, GeofenceRegion};
use crate::permission::PermissionGate;
use crate::sampler::{LocationProvider, LocationSampler, SampleHandler, SamplerHandle};
use crate::scheduler::Scheduler;
use crate::store::{KeyValueStore, StoreError, TrackingStateStore};
use crate::telemetry::{MetricsSnapshot, TrackingMetrics};
use crate::upload::{FlushOutcome, GeofenceEventReporter, SampleBuffer, TrackingBackend};
use crate::BoxFuture;

/// Buffered events per subscriber before slow receivers start lagging.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Platform capabilities the engine is built on.
#[derive(Clone)]
pub struct TrackingComponents {
    pub store: Arc<dyn KeyValueStore>,
    pub provider: Arc<dyn LocationProvider>,
    pub scheduler: Arc<dyn Scheduler>,
    pub backend: Arc<dyn TrackingBackend>,
    pub permissions: Arc<dyn PermissionGate>,
}

impl std::fmt::Debug for TrackingComponents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingComponents").finish_non_exhaustive()
    }
}

struct EngineInner {
    state: TrackingStateStore,
    backend: Arc<dyn TrackingBackend>,
    permissions: Arc<dyn PermissionGate>,
    sampler: LocationSampler,
    buffer: SampleBuffer,
    reporter: GeofenceEventReporter,
    metrics: Arc<TrackingMetrics>,
    events: broadcast::Sender<GeofenceEvent>,

    regions: Mutex<Vec<GeofenceRegion>>,
    geofences: Mutex<GeofenceEngine>,
    session: Mutex<Option<TrackingSession>>,
    last_known: Mutex<Option<LocationSample>>,

    /// Running sampler. Held across start/stop so lifecycle calls serialize.
    running: tokio::sync::Mutex<Option<SamplerHandle>>,
    /// Held while a sample is applied, so persisted membership and event
    /// order follow sample order.
    handling: tokio::sync::Mutex<()>,
}

/// Location tracking and geofence detection for one worker at a time.
#[derive(Clone)]
pub struct TrackingEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for TrackingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingEngine")
            .field("tracking", &self.get_tracking_status())
            .field("regions", &self.inner.regions.lock().len())
            .field("buffered", &self.inner.buffer.len())
            .finish_non_exhaustive()
    }
}

impl TrackingEngine {
    /// Build an engine with no persisted state loaded.
    pub fn new(config: TrackingConfig, components: TrackingComponents) -> Self {
        let metrics = Arc::new(TrackingMetrics::new());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let sampler = LocationSampler::new(
            config.sampler,
            components.provider,
            components.scheduler,
            Arc::clone(&metrics),
        );

        let inner = EngineInner {
            state: TrackingStateStore::new(components.store),
            reporter: GeofenceEventReporter::new(
                Arc::clone(&components.backend),
                Arc::clone(&metrics),
            ),
            backend: components.backend,
            permissions: components.permissions,
            sampler,
            buffer: SampleBuffer::new(config.buffer.capacity),
            metrics,
            events,
            regions: Mutex::new(Vec::new()),
            geofences: Mutex::new(GeofenceEngine::new()),
            session: Mutex::new(None),
            last_known: Mutex::new(None),
            running: tokio::sync::Mutex::new(None),
            handling: tokio::sync::Mutex::new(()),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Build an engine and load the persisted region list, region
    /// memberships and last-known sample. Unreadable state is logged and
    /// treated as empty.
    pub async fn open(config: TrackingConfig, components: TrackingComponents) -> Self {
        let engine = Self::new(config, components);
        let inner = &engine.inner;

        match inner.state.load_region_list().await {
            Ok(regions) => {
                debug!(count = regions.len(), "Loaded geofence regions");
                *inner.regions.lock() = regions;
            }
            Err(e) => inner.persistence_failed("load region list", &e),
        }
        inner.restore_memberships().await;

        match inner.state.load_last_known_location().await {
            Ok(sample) => *inner.last_known.lock() = sample,
            Err(e) => inner.persistence_failed("load last known location", &e),
        }

        engine
    }

    /// Start tracking `worker_id`.
    ///
    /// Returns `false` without creating a session when location permission
    /// is denied. Calling this while already tracking is a no-op that
    /// returns `true`.
    pub async fn start_tracking(&self, worker_id: &str) -> bool {
        let inner = &self.inner;
        let mut running = inner.running.lock().await;

        if running.is_some() {
            let current = inner
                .session
                .lock()
                .as_ref()
                .map(|s| s.worker_id().to_string());
            info!(
                requested = worker_id,
                current = current.as_deref().unwrap_or("-"),
                "Tracking already active"
            );
            return true;
        }

        let permission = inner.permissions.request().await;
        if !permission.allows_tracking() {
            warn!(worker_id, "Location permission denied, not tracking");
            return false;
        }
        if !permission.background {
            warn!("Background location denied, periodic poll may pause in the background");
        }

        inner.restore_memberships().await;

        *inner.session.lock() = Some(TrackingSession::new(worker_id));
        if let Err(e) = inner.state.save_session_state(Some(worker_id), true).await {
            inner.persistence_failed("save session", &e);
        }

        let handler: Arc<dyn SampleHandler> = Arc::new(EngineHandler(Arc::downgrade(inner)));
        *running = Some(inner.sampler.start(worker_id, handler));

        info!(worker_id, "Tracking started");
        true
    }

    /// Stop tracking and flush everything still buffered.
    ///
    /// Safe to call when not tracking; the flush still runs so samples
    /// retained by an earlier failure get another attempt.
    pub async fn stop_tracking(&self) -> FlushOutcome {
        let inner = &self.inner;
        {
            let mut running = inner.running.lock().await;
            match running.take() {
                Some(handle) => {
                    // Waits for a sample still being handled, so it is
                    // buffered before the final flush
                    handle.stop().await;
                    let session = inner.session.lock().take();
                    if let Err(e) = inner.state.clear_session_state().await {
                        inner.persistence_failed("clear session", &e);
                    }
                    info!(
                        worker_id = session.as_ref().map(|s| s.worker_id()).unwrap_or("-"),
                        "Tracking stopped"
                    );
                }
                None => debug!("Stop requested while not tracking"),
            }
        }

        let outcome = inner
            .buffer
            .flush(inner.backend.as_ref(), &inner.metrics)
            .await;
        if !outcome.is_success() {
            warn!(
                retained = outcome.retained,
                "Final flush incomplete, samples kept for the next flush"
            );
        }
        outcome
    }

    /// Restart tracking if a persisted session says it was active.
    ///
    /// Returns whether tracking is active afterwards.
    pub async fn resume_tracking_if_active(&self) -> bool {
        if self.get_tracking_status() {
            return true;
        }

        let (worker_id, is_tracking) = match self.inner.state.load_session_state().await {
            Ok(state) => state,
            Err(e) => {
                self.inner.persistence_failed("load session", &e);
                return false;
            }
        };

        match (worker_id, is_tracking) {
            (Some(worker_id), true) => {
                info!(worker_id = %worker_id, "Resuming persisted tracking session");
                self.start_tracking(&worker_id).await
            }
            _ => {
                debug!("No active session to resume");
                false
            }
        }
    }

    /// Process one sample as if the sampler had produced it.
    pub async fn handle_sample(&self, sample: LocationSample, worker_id: &str) {
        self.inner.handle_sample(sample, worker_id).await;
    }

    pub fn get_tracking_status(&self) -> bool {
        self.inner.session.lock().is_some()
    }

    /// The current session, if tracking.
    pub fn session(&self) -> Option<TrackingSession> {
        self.inner.session.lock().clone()
    }

    pub fn get_last_known_location(&self) -> Option<LocationSample> {
        self.inner.last_known.lock().clone()
    }

    pub fn get_geofences(&self) -> Vec<GeofenceRegion> {
        self.inner.regions.lock().clone()
    }

    /// Add a region, replacing any region with the same id, and persist the
    /// list. Membership of a replaced region is kept.
    pub async fn add_geofence(&self, region: GeofenceRegion) {
        let inner = &self.inner;
        let regions = {
            let mut regions = inner.regions.lock();
            match regions.iter_mut().find(|r| r.id() == region.id()) {
                Some(existing) => *existing = region.clone(),
                None => regions.push(region.clone()),
            }
            regions.clone()
        };

        if self.get_tracking_status() {
            match inner.state.load_membership(region.id()).await {
                Ok(inside) => inner.geofences.lock().restore(region.id(), inside),
                Err(e) => inner.persistence_failed("load membership", &e),
            }
        }

        if let Err(e) = inner.state.save_region_list(&regions).await {
            inner.persistence_failed("save region list", &e);
        }
        info!(
            region_id = region.id(),
            radius_m = region.radius(),
            active = region.is_active(),
            "Geofence added"
        );
    }

    /// Remove a region and its membership state. Returns whether it existed.
    pub async fn remove_geofence(&self, region_id: &str) -> bool {
        let inner = &self.inner;
        let regions = {
            let mut regions = inner.regions.lock();
            let before = regions.len();
            regions.retain(|r| r.id() != region_id);
            if regions.len() == before {
                return false;
            }
            regions.clone()
        };
        inner.geofences.lock().forget(region_id);

        if let Err(e) = inner.state.save_region_list(&regions).await {
            inner.persistence_failed("save region list", &e);
        }
        if let Err(e) = inner.state.remove_membership(region_id).await {
            inner.persistence_failed("remove membership", &e);
        }
        info!(region_id, "Geofence removed");
        true
    }

    /// Receive geofence events as they are detected.
    pub fn subscribe(&self) -> broadcast::Receiver<GeofenceEvent> {
        self.inner.events.subscribe()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Samples waiting for upload.
    pub fn buffered_len(&self) -> usize {
        self.inner.buffer.len()
    }

    /// Flush the buffer now, waiting for any in-flight flush.
    pub async fn flush(&self) -> FlushOutcome {
        self.inner
            .buffer
            .flush(self.inner.backend.as_ref(), &self.inner.metrics)
            .await
    }
}

impl EngineInner {
    fn persistence_failed(&self, operation: &str, error: &StoreError) {
        self.metrics.persistence_failed();
        warn!(operation, error = %error, "Tracking state persistence failed");
    }

    /// Seed in-memory membership from the store for every known region.
    async fn restore_memberships(&self) {
        let _handling = self.handling.lock().await;
        let ids: Vec<String> = self
            .regions
            .lock()
            .iter()
            .map(|r| r.id().to_string())
            .collect();

        for id in ids {
            match self.state.load_membership(&id).await {
                Ok(inside) => self.geofences.lock().restore(id, inside),
                Err(e) => self.persistence_failed("load membership", &e),
            }
        }
    }

    async fn handle_sample(&self, sample: LocationSample, worker_id: &str) {
        let handling = self.handling.lock().await;

        *self.last_known.lock() = Some(sample.clone());
        if let Err(e) = self.state.save_last_known_location(&sample).await {
            self.persistence_failed("save last known location", &e);
        }

        let transitions = {
            let regions = self.regions.lock();
            let mut geofences = self.geofences.lock();
            geofences.evaluate_all(regions.iter(), &sample)
        };

        for transition in transitions {
            if let Err(e) = self
                .state
                .save_membership(&transition.region_id, transition.is_inside())
                .await
            {
                self.persistence_failed("save membership", &e);
            }

            info!(
                worker_id,
                region_id = %transition.region_id,
                event_type = %transition.event_type,
                distance_m = transition.distance_m,
                "Geofence transition"
            );
            self.metrics.geofence_event();

            let event = GeofenceEvent {
                worker_id: worker_id.to_string(),
                region_id: transition.region_id,
                region_name: transition.region_name,
                event_type: transition.event_type,
                location: sample.clone(),
                timestamp: now_millis(),
                distance_m: transition.distance_m,
            };
            // No subscribers is fine
            let _ = self.events.send(event.clone());
            self.reporter.dispatch(event);
        }

        let full = self.buffer.push(worker_id, sample);
        drop(handling);

        if full {
            debug!(
                buffered = self.buffer.len(),
                capacity = self.buffer.capacity(),
                "Buffer full, flushing"
            );
            self.buffer
                .try_flush(self.backend.as_ref(), &self.metrics)
                .await;
        }
    }
}

/// Sampler callback holding the engine weakly, so a running sampler never
/// keeps a dropped engine alive.
struct EngineHandler(Weak<EngineInner>);

impl SampleHandler for EngineHandler {
    fn handle_sample<'a>(
        &'a self,
        sample: LocationSample,
        worker_id: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match self.0.upgrade() {
                Some(inner) => inner.handle_sample(sample, worker_id).await,
                None => debug!("Engine dropped, discarding sample"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geofence::GeofenceEventType;
    use crate::permission::{PermissionStatus, StaticPermissionGate};
    use crate::sampler::{FetchOptions, LocationError, WatchOptions, WatchStream};
    use crate::scheduler::TokioScheduler;
    use crate::store::MemoryStore;
    use crate::upload::MockBackend;
    use std::time::Duration;

    /// Provider with no watch and no fixes; tests inject samples directly.
    struct SilentProvider;

    impl LocationProvider for SilentProvider {
        fn current_position(
            &self,
            _options: FetchOptions,
        ) -> BoxFuture<'_, Result<LocationSample, LocationError>> {
            Box::pin(async { Err(LocationError::Unavailable("silent".into())) })
        }

        fn watch(&self, _options: WatchOptions) -> Result<WatchStream, LocationError> {
            Err(LocationError::Unavailable("silent".into()))
        }
    }

    struct Fixture {
        engine: TrackingEngine,
        store: Arc<MemoryStore>,
        backend: Arc<MockBackend>,
        permissions: Arc<StaticPermissionGate>,
    }

    fn fixture_with(config: TrackingConfig, backend: MockBackend, store: Arc<MemoryStore>) -> Fixture {
        let backend = Arc::new(backend);
        let permissions = Arc::new(StaticPermissionGate::granted());
        let engine = TrackingEngine::new(
            config,
            TrackingComponents {
                store: store.clone(),
                provider: Arc::new(SilentProvider),
                scheduler: Arc::new(TokioScheduler::new()),
                backend: backend.clone(),
                permissions: permissions.clone(),
            },
        );
        Fixture {
            engine,
            store,
            backend,
            permissions,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            TrackingConfig::default(),
            MockBackend::default(),
            Arc::new(MemoryStore::new()),
        )
    }

    fn region_a() -> GeofenceRegion {
        GeofenceRegion::new("a", "Site A", 40.7128, -74.0060, 100.0).unwrap()
    }

    fn inside_a() -> LocationSample {
        LocationSample::new(40.7129, -74.0061, 5.0)
    }

    fn outside_a() -> LocationSample {
        LocationSample::new(40.8000, -74.0000, 5.0)
    }

    #[tokio::test]
    async fn test_enter_stay_exit_emits_two_events() {
        let f = fixture();
        f.engine.add_geofence(region_a()).await;
        let mut events = f.engine.subscribe();
        assert!(f.engine.start_tracking("w-1").await);

        f.engine.handle_sample(inside_a(), "w-1").await;
        f.engine.handle_sample(inside_a(), "w-1").await;
        f.engine.handle_sample(outside_a(), "w-1").await;

        let enter = events.recv().await.unwrap();
        assert_eq!(enter.event_type, GeofenceEventType::Enter);
        assert_eq!(enter.region_id, "a");
        assert_eq!(enter.worker_id, "w-1");
        assert!(enter.distance_m < 20.0);

        let exit = events.recv().await.unwrap();
        assert_eq!(exit.event_type, GeofenceEventType::Exit);
        assert!(events.try_recv().is_err());

        assert_eq!(f.engine.metrics().geofence_events, 2);
        f.engine.stop_tracking().await;
    }

    #[tokio::test]
    async fn test_membership_persisted_before_handle_returns() {
        let f = fixture();
        f.engine.add_geofence(region_a()).await;

        f.engine.handle_sample(inside_a(), "w-1").await;

        let state = TrackingStateStore::new(f.store.clone());
        assert!(state.load_membership("a").await.unwrap());
        assert_eq!(
            state.load_last_known_location().await.unwrap(),
            Some(inside_a())
        );
        assert_eq!(f.engine.get_last_known_location(), Some(inside_a()));
    }

    #[tokio::test]
    async fn test_events_reported_to_backend() {
        let f = fixture();
        f.engine.add_geofence(region_a()).await;
        f.engine.handle_sample(inside_a(), "w-1").await;

        for _ in 0..100 {
            if !f.backend.events.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let events = f.backend.events.lock().clone();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].region_name, "Site A");
    }

    #[tokio::test]
    async fn test_permission_denied_creates_no_session() {
        let f = fixture();
        f.permissions.set(PermissionStatus::DENIED);

        assert!(!f.engine.start_tracking("w-1").await);
        assert!(!f.engine.get_tracking_status());
        assert!(f.engine.session().is_none());

        let state = TrackingStateStore::new(f.store.clone());
        assert_eq!(state.load_session_state().await.unwrap(), (None, false));
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let f = fixture();
        assert!(f.engine.start_tracking("w-1").await);
        assert!(f.engine.start_tracking("w-2").await);
        assert_eq!(f.engine.session().unwrap().worker_id(), "w-1");
        f.engine.stop_tracking().await;
    }

    #[tokio::test]
    async fn test_start_and_stop_persist_session() {
        let f = fixture();
        let state = TrackingStateStore::new(f.store.clone());

        f.engine.start_tracking("w-1").await;
        assert_eq!(
            state.load_session_state().await.unwrap(),
            (Some("w-1".to_string()), true)
        );

        f.engine.stop_tracking().await;
        assert!(!f.engine.get_tracking_status());
        assert_eq!(state.load_session_state().await.unwrap(), (None, false));
    }

    #[tokio::test]
    async fn test_resume_restarts_persisted_session() {
        let store = Arc::new(MemoryStore::new());
        TrackingStateStore::new(store.clone())
            .save_session_state(Some("w-9"), true)
            .await
            .unwrap();

        let f = fixture_with(TrackingConfig::default(), MockBackend::default(), store);
        assert!(f.engine.resume_tracking_if_active().await);
        assert_eq!(f.engine.session().unwrap().worker_id(), "w-9");

        // Already active
        assert!(f.engine.resume_tracking_if_active().await);
        f.engine.stop_tracking().await;
    }

    #[tokio::test]
    async fn test_resume_without_session_does_nothing() {
        let f = fixture();
        assert!(!f.engine.resume_tracking_if_active().await);
        assert!(!f.engine.get_tracking_status());
    }

    #[tokio::test]
    async fn test_restored_membership_suppresses_duplicate_enter() {
        let store = Arc::new(MemoryStore::new());
        TrackingStateStore::new(store.clone())
            .save_membership("a", true)
            .await
            .unwrap();

        let f = fixture_with(TrackingConfig::default(), MockBackend::default(), store);
        f.engine.add_geofence(region_a()).await;
        f.engine.start_tracking("w-1").await;

        let mut events = f.engine.subscribe();
        f.engine.handle_sample(inside_a(), "w-1").await;
        assert!(events.try_recv().is_err());

        f.engine.handle_sample(outside_a(), "w-1").await;
        assert_eq!(events.recv().await.unwrap().event_type, GeofenceEventType::Exit);
        f.engine.stop_tracking().await;
    }

    #[tokio::test]
    async fn test_inactive_region_is_ignored() {
        let f = fixture();
        f.engine.add_geofence(region_a().with_active(false)).await;
        let mut events = f.engine.subscribe();

        f.engine.handle_sample(inside_a(), "w-1").await;

        assert!(events.try_recv().is_err());
        assert_eq!(f.engine.metrics().geofence_events, 0);
    }

    #[tokio::test]
    async fn test_add_geofence_upserts_by_id() {
        let f = fixture();
        f.engine.add_geofence(region_a()).await;
        f.engine
            .add_geofence(GeofenceRegion::new("a", "Site A2", 1.0, 2.0, 50.0).unwrap())
            .await;

        let regions = f.engine.get_geofences();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].name(), "Site A2");

        let persisted = TrackingStateStore::new(f.store.clone())
            .load_region_list()
            .await
            .unwrap();
        assert_eq!(persisted, regions);
    }

    #[tokio::test]
    async fn test_remove_geofence_clears_membership() {
        let f = fixture();
        f.engine.add_geofence(region_a()).await;
        f.engine.handle_sample(inside_a(), "w-1").await;

        assert!(f.engine.remove_geofence("a").await);
        assert!(!f.engine.remove_geofence("a").await);
        assert!(f.engine.get_geofences().is_empty());
        assert_eq!(f.store.get("fieldtrack:membership:a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_full_buffer_without_network_retains_samples() {
        let f = fixture_with(
            TrackingConfig::default().with_buffer_capacity(3),
            MockBackend::offline(),
            Arc::new(MemoryStore::new()),
        );

        for i in 0..3 {
            f.engine
                .handle_sample(LocationSample::at(1.0, 2.0, 3.0, i), "w-1")
                .await;
        }

        let snapshot = f.engine.metrics();
        assert_eq!(snapshot.flushes, 1);
        assert_eq!(snapshot.uploads_failed, 1);
        assert_eq!(f.engine.buffered_len(), 3);
        assert_eq!(
            f.engine.inner.buffer.samples(),
            (0..3)
                .map(|i| LocationSample::at(1.0, 2.0, 3.0, i))
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_full_buffer_uploads_in_order() {
        let f = fixture_with(
            TrackingConfig::default().with_buffer_capacity(2),
            MockBackend::default(),
            Arc::new(MemoryStore::new()),
        );

        f.engine.handle_sample(LocationSample::at(1.0, 1.0, 1.0, 1), "w-1").await;
        assert_eq!(f.engine.buffered_len(), 1);
        f.engine.handle_sample(LocationSample::at(2.0, 2.0, 1.0, 2), "w-1").await;

        assert_eq!(f.engine.buffered_len(), 0);
        let uploaded: Vec<i64> = f
            .backend
            .locations
            .lock()
            .iter()
            .map(|(_, s)| s.timestamp)
            .collect();
        assert_eq!(uploaded, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_stop_forces_final_flush() {
        let f = fixture();
        f.engine.start_tracking("w-1").await;
        f.engine.handle_sample(inside_a(), "w-1").await;
        assert_eq!(f.engine.buffered_len(), 1);

        let outcome = f.engine.stop_tracking().await;
        assert!(outcome.is_success());
        assert_eq!(outcome.sent, 1);
        assert_eq!(f.engine.buffered_len(), 0);
        assert_eq!(f.backend.locations.lock()[0].0, "w-1");
    }

    #[tokio::test]
    async fn test_open_loads_persisted_state() {
        let store = Arc::new(MemoryStore::new());
        let state = TrackingStateStore::new(store.clone());
        state.save_region_list(&[region_a()]).await.unwrap();
        state.save_last_known_location(&inside_a()).await.unwrap();

        let engine = TrackingEngine::open(
            TrackingConfig::default(),
            TrackingComponents {
                store,
                provider: Arc::new(SilentProvider),
                scheduler: Arc::new(TokioScheduler::new()),
                backend: Arc::new(MockBackend::default()),
                permissions: Arc::new(StaticPermissionGate::granted()),
            },
        )
        .await;

        assert_eq!(engine.get_geofences(), vec![region_a()]);
        assert_eq!(engine.get_last_known_location(), Some(inside_a()));
        assert!(!engine.get_tracking_status());
    }

    /// Store whose writes matching `slow` take 50ms.
    struct SlowStore {
        inner: MemoryStore,
        slow: fn(&str, &serde_json::Value) -> bool,
    }

    impl KeyValueStore for SlowStore {
        fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<serde_json::Value>, StoreError>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: serde_json::Value) -> BoxFuture<'_, Result<(), StoreError>> {
            let delay = (self.slow)(key, &value);
            let key = key.to_string();
            Box::pin(async move {
                if delay {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                self.inner.set(&key, value).await
            })
        }

        fn remove(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
            self.inner.remove(key)
        }
    }

    /// Provider whose watch emits one fix and then ends.
    struct OneFixProvider(LocationSample);

    impl LocationProvider for OneFixProvider {
        fn current_position(
            &self,
            _options: FetchOptions,
        ) -> BoxFuture<'_, Result<LocationSample, LocationError>> {
            Box::pin(async { Err(LocationError::Unavailable("watch only".into())) })
        }

        fn watch(&self, _options: WatchOptions) -> Result<WatchStream, LocationError> {
            let (tx, rx) = tokio::sync::mpsc::channel(1);
            tx.try_send(Ok(self.0.clone()))
                .map_err(|e| LocationError::Unavailable(e.to_string()))?;
            Ok(rx)
        }
    }

    fn engine_on(
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn LocationProvider>,
        backend: Arc<MockBackend>,
    ) -> TrackingEngine {
        TrackingEngine::new(
            TrackingConfig::default(),
            TrackingComponents {
                store,
                provider,
                scheduler: Arc::new(TokioScheduler::new()),
                backend,
                permissions: Arc::new(StaticPermissionGate::granted()),
            },
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_samples_apply_in_arrival_order() {
        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(),
            slow: |key, value| {
                key.starts_with("fieldtrack:membership:") && value == &serde_json::json!(true)
            },
        });
        let backend = Arc::new(MockBackend::default());
        let engine = engine_on(store.clone(), Arc::new(SilentProvider), backend.clone());
        engine.add_geofence(region_a()).await;
        let mut events = engine.subscribe();

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.handle_sample(inside_a(), "w-1").await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.handle_sample(outside_a(), "w-1").await })
        };
        first.await.unwrap();
        second.await.unwrap();

        let persisted = TrackingStateStore::new(store.clone())
            .load_membership("a")
            .await
            .unwrap();
        assert!(!persisted);
        assert_eq!(persisted, engine.inner.geofences.lock().is_inside("a"));
        assert_eq!(engine.get_last_known_location(), Some(outside_a()));

        assert_eq!(events.recv().await.unwrap().event_type, GeofenceEventType::Enter);
        assert_eq!(events.recv().await.unwrap().event_type, GeofenceEventType::Exit);

        for _ in 0..100 {
            if backend.events.lock().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let reported: Vec<GeofenceEventType> =
            backend.events.lock().iter().map(|e| e.event_type).collect();
        assert_eq!(reported, vec![GeofenceEventType::Enter, GeofenceEventType::Exit]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_flushes_sample_still_being_handled() {
        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(),
            slow: |key, _| key == "fieldtrack:last_location",
        });
        let backend = Arc::new(MockBackend::default());
        let engine = engine_on(
            store,
            Arc::new(OneFixProvider(inside_a())),
            backend.clone(),
        );

        assert!(engine.start_tracking("w-1").await);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let outcome = engine.stop_tracking().await;

        assert_eq!(outcome.sent, 1);
        assert_eq!(engine.buffered_len(), 0);
        assert_eq!(backend.locations.lock().len(), 1);

        // Nothing arrives after the final flush
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(engine.buffered_len(), 0);
    }

    #[tokio::test]
    async fn test_open_restores_membership_before_tracking() {
        let store = Arc::new(MemoryStore::new());
        let state = TrackingStateStore::new(store.clone());
        state.save_region_list(&[region_a()]).await.unwrap();
        state.save_membership("a", true).await.unwrap();

        let engine = TrackingEngine::open(
            TrackingConfig::default(),
            TrackingComponents {
                store,
                provider: Arc::new(SilentProvider),
                scheduler: Arc::new(TokioScheduler::new()),
                backend: Arc::new(MockBackend::default()),
                permissions: Arc::new(StaticPermissionGate::granted()),
            },
        )
        .await;
        let mut events = engine.subscribe();

        engine.handle_sample(inside_a(), "w-1").await;
        assert!(events.try_recv().is_err());
        assert_eq!(engine.metrics().geofence_events, 0);
    }
}
