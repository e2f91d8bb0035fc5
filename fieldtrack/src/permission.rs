//! Location permission gate.
//!
//! Sampling starts only after the platform grants location access. The
//! engine treats the platform subsystem as a yes/no gate.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::BoxFuture;

/// Outcome of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionStatus {
    /// Fine (precise) location while in the foreground.
    pub foreground: bool,
    /// Location while in the background.
    pub background: bool,
}

impl PermissionStatus {
    pub const GRANTED: Self = Self {
        foreground: true,
        background: true,
    };

    pub const DENIED: Self = Self {
        foreground: false,
        background: false,
    };

    /// Tracking requires foreground access. Background access only affects
    /// whether the periodic poll can run while backgrounded.
    pub fn allows_tracking(&self) -> bool {
        self.foreground
    }
}

/// Platform permission subsystem.
pub trait PermissionGate: Send + Sync {
    /// Check current permissions, prompting the user if the platform allows.
    fn request(&self) -> BoxFuture<'_, PermissionStatus>;
}

/// Gate with a fixed, switchable answer. Used on platforms without a
/// permission model and in tests.
#[derive(Debug)]
pub struct StaticPermissionGate {
    foreground: AtomicBool,
    background: AtomicBool,
}

impl StaticPermissionGate {
    pub fn granted() -> Self {
        Self::with_status(PermissionStatus::GRANTED)
    }

    pub fn denied() -> Self {
        Self::with_status(PermissionStatus::DENIED)
    }

    pub fn with_status(status: PermissionStatus) -> Self {
        Self {
            foreground: AtomicBool::new(status.foreground),
            background: AtomicBool::new(status.background),
        }
    }

    /// Change the answer for subsequent requests.
    pub fn set(&self, status: PermissionStatus) {
        self.foreground.store(status.foreground, Ordering::SeqCst);
        self.background.store(status.background, Ordering::SeqCst);
    }
}

impl PermissionGate for StaticPermissionGate {
    fn request(&self) -> BoxFuture<'_, PermissionStatus> {
        let status = PermissionStatus {
            foreground: self.foreground.load(Ordering::SeqCst),
            background: self.background.load(Ordering::SeqCst),
        };
        Box::pin(async move { status })
    }
}
