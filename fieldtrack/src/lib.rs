//! FieldTrack - location tracking and geofence detection for field workers.
//!
//! The engine samples the device position through two concurrent paths (a
//! movement-filtered continuous watch and a periodic background poll),
//! detects ENTER/EXIT transitions against circular geofence regions, buffers
//! samples for batched upload, and persists enough state to resume after a
//! restart.
//!
//! Platform concerns are injected as capabilities:
//!
//! | Capability | Trait | Provided |
//! |------------|-------|----------|
//! | Position source | [`sampler::LocationProvider`] | [`sampler::ReplayProvider`] |
//! | Background timer | [`scheduler::Scheduler`] | [`scheduler::TokioScheduler`] |
//! | Durable state | [`store::KeyValueStore`] | [`store::MemoryStore`], [`store::JsonFileStore`] |
//! | Server | [`upload::TrackingBackend`] | [`upload::HttpBackend`], [`upload::LogBackend`] |
//! | Permissions | [`permission::PermissionGate`] | [`permission::StaticPermissionGate`] |
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fieldtrack::{TrackingComponents, TrackingConfig, TrackingEngine};
//! use fieldtrack::permission::StaticPermissionGate;
//! use fieldtrack::sampler::ReplayProvider;
//! use fieldtrack::scheduler::TokioScheduler;
//! use fieldtrack::store::MemoryStore;
//! use fieldtrack::upload::LogBackend;
//!
//! # async fn run() {
//! let engine = TrackingEngine::open(
//!     TrackingConfig::default(),
//!     TrackingComponents {
//!         store: Arc::new(MemoryStore::new()),
//!         provider: Arc::new(ReplayProvider::new(Vec::new(), 1.0)),
//!         scheduler: Arc::new(TokioScheduler::new()),
//!         backend: Arc::new(LogBackend),
//!         permissions: Arc::new(StaticPermissionGate::granted()),
//!     },
//! )
//! .await;
//!
//! if engine.start_tracking("worker-42").await {
//!     // ...
//!     engine.stop_tracking().await;
//! }
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod geo;
pub mod geofence;
pub mod logging;
pub mod permission;
pub mod sampler;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod upload;

pub use config::{ConfigError, TrackingConfig};
pub use engine::{TrackingComponents, TrackingEngine, TrackingSession};
pub use geo::LocationSample;
pub use geofence::{GeofenceEvent, GeofenceEventType, GeofenceRegion};
pub use store::BoxFuture;
