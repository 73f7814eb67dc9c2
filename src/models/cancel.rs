use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// User-level cancel request, set by the wait surface's cancel control
///
/// The surface owns it, but any thread may read it directly: the task body
/// polls it without a round-trip to the UI thread.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    requested: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// The two independent cancellation sources of a run
///
/// Built fresh from the live sources on every query, so the combined
/// answer is never stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CancellationFlags {
    /// Requested through the task runner's own cancellation API
    pub runner_cancel_requested: bool,
    /// Requested by the user through the wait surface
    pub user_cancel_requested: bool,
}

impl CancellationFlags {
    pub fn is_pending(&self) -> bool {
        self.runner_cancel_requested || self.user_cancel_requested
    }
}
