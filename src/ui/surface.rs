// WaitSurface - capability contract of the modal "please wait" surface
//
// The coordinator never assumes a concrete visual implementation. Anything
// that can hold a ProgressState, expose a cancel flag and block in a modal
// loop between show() and hide() can stand in. TextWaitSurface is the
// bundled one: it renders status lines through tracing.

use crate::models::{BarStyle, CancelFlag, ProgressChange, ProgressState};
use crate::platform::UiPlatform;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Modal wait surface, used on the UI thread only
///
/// Implementors provide state storage, the cancel flag and the show/hide
/// lifecycle; every per-field getter and setter is derived from
/// [`progress`](Self::progress) and [`apply`](Self::apply).
///
/// All methods take `&self`: the surface is re-entered while [`show`](Self::show)
/// is blocked (queued progress writes and the watcher's `hide` run inside the
/// modal loop), so implementors use interior mutability and must not hold a
/// borrow across the modal loop.
pub trait WaitSurface {
    /// Snapshot of the displayed progress
    fn progress(&self) -> ProgressState;

    /// Apply one progress write
    fn apply(&self, change: ProgressChange);

    /// The user-level cancel flag set by the surface's cancel control
    fn cancel_flag(&self) -> CancelFlag;

    /// Show modally. Does not return until [`hide`](Self::hide) is called.
    fn show(&self);

    fn hide(&self);

    fn is_visible(&self) -> bool;

    /// Release resources. Called once by the owning coordinator.
    fn dispose(&self) {}

    fn message(&self) -> String {
        self.progress().message
    }

    fn set_message(&self, message: &str) {
        self.apply(ProgressChange::Message(message.to_string()));
    }

    fn bar_visible(&self) -> bool {
        self.progress().bar_visible
    }

    fn set_bar_visible(&self, visible: bool) {
        self.apply(ProgressChange::BarVisible(visible));
    }

    fn bar_style(&self) -> BarStyle {
        self.progress().bar_style
    }

    fn set_bar_style(&self, style: BarStyle) {
        self.apply(ProgressChange::BarStyle(style));
    }

    fn bar_value(&self) -> i32 {
        self.progress().bar_value
    }

    fn set_bar_value(&self, value: i32) {
        self.apply(ProgressChange::BarValue(value));
    }

    fn bar_step(&self) -> i32 {
        self.progress().bar_step
    }

    fn set_bar_step(&self, step: i32) {
        self.apply(ProgressChange::BarStep(step));
    }

    fn perform_step(&self) {
        self.apply(ProgressChange::PerformStep);
    }

    fn bar_minimum(&self) -> i32 {
        self.progress().bar_minimum
    }

    fn set_bar_minimum(&self, minimum: i32) {
        self.apply(ProgressChange::BarMinimum(minimum));
    }

    fn bar_maximum(&self) -> i32 {
        self.progress().bar_maximum
    }

    fn set_bar_maximum(&self, maximum: i32) {
        self.apply(ProgressChange::BarMaximum(maximum));
    }

    fn cancel_control_visible(&self) -> bool {
        self.progress().cancel_control_visible
    }

    fn set_cancel_control_visible(&self, visible: bool) {
        self.apply(ProgressChange::CancelControlVisible(visible));
    }

    fn cancel_requested(&self) -> bool {
        self.cancel_flag().is_requested()
    }

    fn set_cancel_requested(&self, requested: bool) {
        let flag = self.cancel_flag();
        if requested {
            flag.request();
        } else {
            flag.clear();
        }
    }
}

/// Default wait surface: logs a rendered status line whenever the visible
/// state changes and runs the platform's modal loop while shown
pub struct TextWaitSurface {
    platform: Rc<dyn UiPlatform>,
    state: RefCell<ProgressState>,
    visible: Cell<bool>,
    cancel: CancelFlag,
    bar_width: usize,
}

impl TextWaitSurface {
    pub fn new(platform: Rc<dyn UiPlatform>) -> Self {
        Self {
            platform,
            state: RefCell::new(ProgressState::default()),
            visible: Cell::new(false),
            cancel: CancelFlag::new(),
            bar_width: 30,
        }
    }

    /// Width of the rendered bar in characters
    pub fn with_bar_width(mut self, bar_width: usize) -> Self {
        self.bar_width = bar_width;
        self
    }

    /// Current rendered status line
    pub fn render(&self) -> String {
        self.state.borrow().render_line(self.bar_width)
    }
}

impl WaitSurface for TextWaitSurface {
    fn progress(&self) -> ProgressState {
        self.state.borrow().clone()
    }

    fn apply(&self, change: ProgressChange) {
        let changed = self.state.borrow_mut().apply(change);
        if changed && self.visible.get() {
            tracing::info!(target: "waitrun::surface", "{}", self.render());
        }
    }

    fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn show(&self) {
        if self.visible.get() {
            tracing::warn!("Wait surface is already shown; ignoring nested show");
            return;
        }

        self.visible.set(true);
        tracing::info!(target: "waitrun::surface", "{}", self.render());

        self.platform.run_modal(&|| !self.visible.get());

        // The loop may also end because the platform is quitting
        self.visible.set(false);
    }

    fn hide(&self) {
        if self.visible.replace(false) {
            tracing::debug!("Wait surface hidden");
        }
    }

    fn is_visible(&self) -> bool {
        self.visible.get()
    }

    fn dispose(&self) {
        self.hide();
        tracing::debug!("Wait surface disposed");
    }
}
