// ProgressReporter - thread-safe progress handle given to task bodies
//
// Writes travel as ProgressChange values through the marshaller, so they are
// applied on the UI thread in posting order. Reads are blocking round-trips.
// Cancellation is read straight from the runner and the surface's cancel
// flag, never cached. Once the surface is released only the runner half
// counts.

use crate::models::{BarStyle, CancelFlag, CancellationFlags, ProgressChange, ProgressState};
use crate::services::RunnerStatus;
use crate::ui::marshal::{MarshalError, Marshaller};
use crate::ui::surface::WaitSurface;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable, `Send + Sync` view of a coordinator's wait surface
#[derive(Clone)]
pub struct ProgressReporter {
    marshaller: Option<Marshaller<dyn WaitSurface>>,
    user_cancel: Option<CancelFlag>,
    runner: Option<Arc<dyn RunnerStatus>>,
    released: Arc<AtomicBool>,
}

impl ProgressReporter {
    pub(crate) fn new(
        marshaller: Marshaller<dyn WaitSurface>,
        user_cancel: CancelFlag,
        runner: Arc<dyn RunnerStatus>,
    ) -> Self {
        Self {
            marshaller: Some(marshaller),
            user_cancel: Some(user_cancel),
            runner: Some(runner),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A reporter bound to no surface.
    ///
    /// Writes are discarded, reads fail with [`MarshalError::TargetReleased`]
    /// and cancellation is never pending. Useful for running a task body
    /// without a coordinator.
    pub fn detached() -> Self {
        Self {
            marshaller: None,
            user_cancel: None,
            runner: None,
            released: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_detached(&self) -> bool {
        self.marshaller.is_none()
    }

    /// Mark the surface as gone for this reporter and all its clones
    pub(crate) fn release_surface(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    pub fn is_surface_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Queue one progress write onto the UI thread
    pub fn report(&self, change: ProgressChange) {
        if let Some(marshaller) = &self.marshaller {
            marshaller.post(move |surface| surface.apply(change));
        }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.report(ProgressChange::Message(message.into()));
    }

    pub fn set_bar_visible(&self, visible: bool) {
        self.report(ProgressChange::BarVisible(visible));
    }

    pub fn set_bar_style(&self, style: BarStyle) {
        self.report(ProgressChange::BarStyle(style));
    }

    pub fn set_bar_value(&self, value: i32) {
        self.report(ProgressChange::BarValue(value));
    }

    pub fn set_bar_step(&self, step: i32) {
        self.report(ProgressChange::BarStep(step));
    }

    pub fn perform_step(&self) {
        self.report(ProgressChange::PerformStep);
    }

    pub fn set_bar_minimum(&self, minimum: i32) {
        self.report(ProgressChange::BarMinimum(minimum));
    }

    pub fn set_bar_maximum(&self, maximum: i32) {
        self.report(ProgressChange::BarMaximum(maximum));
    }

    pub fn set_cancel_control_visible(&self, visible: bool) {
        self.report(ProgressChange::CancelControlVisible(visible));
    }

    /// Current bar value. Blocks until the UI thread answers when called
    /// from a background thread.
    pub fn bar_value(&self) -> Result<i32, MarshalError> {
        self.query(|surface| surface.bar_value())
    }

    /// Snapshot of everything the surface displays
    pub fn progress(&self) -> Result<ProgressState, MarshalError> {
        self.query(|surface| surface.progress())
    }

    /// The user pressed the surface's cancel control. `false` once the
    /// surface has been released.
    pub fn is_user_cancel_requested(&self) -> bool {
        !self.is_surface_released()
            && self
                .user_cancel
                .as_ref()
                .is_some_and(|flag| flag.is_requested())
    }

    /// Runner-level OR user-level cancellation
    pub fn is_cancellation_pending(&self) -> bool {
        CancellationFlags {
            runner_cancel_requested: self
                .runner
                .as_ref()
                .is_some_and(|runner| runner.is_cancel_requested()),
            user_cancel_requested: self.is_user_cancel_requested(),
        }
        .is_pending()
    }

    fn query<R, F>(&self, function: F) -> Result<R, MarshalError>
    where
        F: FnOnce(&dyn WaitSurface) -> R + Send + 'static,
        R: Send + 'static,
    {
        match &self.marshaller {
            Some(marshaller) => marshaller.send(move |surface| function(surface)),
            None => Err(MarshalError::TargetReleased),
        }
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("detached", &self.is_detached())
            .field("cancellation_pending", &self.is_cancellation_pending())
            .finish()
    }
}
