//! UI platform adapter.
//!
//! The coordinator and the completion watcher never talk to a concrete UI
//! toolkit. Everything they need from one is collected here:
//!
//! - [`Dispatch`]: the `Send + Sync` half, used from any thread to ask
//!   "am I on the UI thread?" and to queue work onto it
//! - [`UiPlatform`]: the UI-thread half, owning timers and the (nested)
//!   message loop a modal surface blocks inside
//! - [`UiBound`]: a cross-thread token for a value that lives on the UI thread
//!
//! [`EventLoop`] is the bundled implementation. A toolkit integration only has
//! to provide these two traits to reuse the rest of the crate.

pub mod affinity;
pub mod event_loop;

pub use affinity::UiBound;
pub use event_loop::{EventLoop, LoopDispatcher};

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A unit of work queued onto the UI thread
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Timer callback. Runs on the UI thread only, so it need not be `Send`.
pub type TimerTick = Box<dyn FnMut() -> TimerFlow + 'static>;

/// What a timer wants after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerFlow {
    Continue,
    Stop,
}

/// Handle of a running UI timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub(crate) u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Errors from the platform layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("UI event loop has shut down")]
    LoopClosed,
}

/// Thread-safe access to the UI thread's queue
pub trait Dispatch: Send + Sync {
    /// True when called on the thread that owns the UI
    fn is_owner_thread(&self) -> bool;

    /// Queue `job` to run on the UI thread and return immediately.
    ///
    /// Jobs posted from one thread run in the order they were posted.
    fn post(&self, job: Job) -> Result<(), PlatformError>;
}

/// UI-thread services: timers and the modal message loop
///
/// Implementors are owned by, and only used on, the UI thread.
pub trait UiPlatform {
    /// Shareable dispatcher for background threads
    fn dispatcher(&self) -> std::sync::Arc<dyn Dispatch>;

    fn is_owner_thread(&self) -> bool {
        self.dispatcher().is_owner_thread()
    }

    /// Start a recurring timer. The first tick fires one `interval` from now.
    fn start_timer(&self, interval: Duration, tick: TimerTick) -> TimerId;

    /// Stop a timer. Stopping an unknown or already stopped timer is a no-op.
    fn stop_timer(&self, id: TimerId);

    fn is_timer_active(&self, id: TimerId) -> bool;

    /// Keep servicing queued jobs and timers until `until` returns true.
    ///
    /// This is the loop a modal surface blocks inside; it may be entered
    /// from within a job or a timer tick.
    fn run_modal(&self, until: &dyn Fn() -> bool);

    /// Block the UI thread without servicing anything
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
