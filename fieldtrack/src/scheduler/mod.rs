//! Periodic background task scheduling.
//!
//! The [`Scheduler`] trait abstracts the platform's background scheduler
//! (`register_periodic` / `cancel`). [`TokioScheduler`] implements it with a
//! Tokio interval per task and a cancellation token registry.
//!
//! Callbacks of one task never overlap: the next tick is awaited only after
//! the previous callback future completes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::BoxFuture;

/// Shortest period a task runs at; shorter requests are raised to this.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Identifier of a registered periodic task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Callback invoked on every tick of a periodic task.
pub type PeriodicCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Background task scheduler capability.
pub trait Scheduler: Send + Sync {
    /// Register `callback` to run every `interval`, first run one interval
    /// from now.
    fn register_periodic(&self, name: &str, interval: Duration, callback: PeriodicCallback)
        -> TaskId;

    /// Cancel a task. Returns false if the id is unknown.
    ///
    /// A callback already running is allowed to finish.
    fn cancel(&self, task: TaskId) -> bool;
}

/// Scheduler backed by Tokio timers.
///
/// `register_periodic` must be called from within a Tokio runtime.
#[derive(Debug, Default)]
pub struct TokioScheduler {
    next_id: AtomicU64,
    tasks: DashMap<TaskId, CancellationToken>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered, not yet cancelled tasks.
    pub fn active_tasks(&self) -> usize {
        self.tasks.len()
    }
}

impl Scheduler for TokioScheduler {
    fn register_periodic(
        &self,
        name: &str,
        interval: Duration,
        callback: PeriodicCallback,
    ) -> TaskId {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let token = CancellationToken::new();
        self.tasks.insert(id, token.clone());

        let name = name.to_string();
        let interval = interval.max(MIN_PERIOD);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(task = %id, name = %name, interval_ms = interval.as_millis() as u64, "Periodic task registered");

            loop {
                tokio::select! {
                    biased;

                    _ = token.cancelled() => break,

                    _ = ticker.tick() => {
                        callback().await;
                    }
                }
            }

            tracing::debug!(task = %id, name = %name, "Periodic task stopped");
        });

        id
    }

    fn cancel(&self, task: TaskId) -> bool {
        match self.tasks.remove(&task) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for entry in self.tasks.iter() {
            entry.value().cancel();
        }
    }
}
