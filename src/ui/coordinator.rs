// Coordinator - runs a task off the UI thread behind a modal wait surface
//
// Start protocol, on the UI thread:
// 1. Show the cancel control only if the runner can cancel
// 2. Clear any previous user cancel request
// 3. Start the runner
// 4. Start the completion watcher
// 5. Sleep the grace period so fast tasks never flash the surface
// 6. Still busy? Show modally until the watcher hides the surface

use crate::metrics::CoordinatorMetrics;
use crate::models::{BarStyle, CancelFlag, CoordinatorConfig};
use crate::platform::{UiBound, UiPlatform};
use crate::services::{RunnerError, RunnerStatus, TaskRunner};
use crate::ui::marshal::{MarshalError, Marshaller};
use crate::ui::reporter::ProgressReporter;
use crate::ui::surface::{TextWaitSurface, WaitSurface};
use crate::ui::watcher::CompletionWatcher;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("No wait surface was configured")]
    MissingSurface,

    #[error("Coordinator must be used on the UI thread")]
    NotOnUiThread,

    #[error("Invalid coordinator configuration: {0}")]
    InvalidConfig(String),

    #[error("Coordinator has been disposed")]
    Disposed,

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Marshal(#[from] MarshalError),
}

enum SurfaceChoice {
    Unset,
    Default,
    Custom(Rc<dyn WaitSurface>),
}

/// Builder for [`Coordinator`]
pub struct CoordinatorBuilder<R: TaskRunner + 'static> {
    platform: Rc<dyn UiPlatform>,
    runner: Arc<R>,
    surface: SurfaceChoice,
    config: CoordinatorConfig,
    metrics: Option<Arc<CoordinatorMetrics>>,
}

impl<R: TaskRunner + 'static> CoordinatorBuilder<R> {
    /// Use a caller-provided wait surface
    pub fn surface(mut self, surface: Rc<dyn WaitSurface>) -> Self {
        self.surface = SurfaceChoice::Custom(surface);
        self
    }

    /// Use the bundled [`TextWaitSurface`]
    pub fn default_surface(mut self) -> Self {
        self.surface = SurfaceChoice::Default;
        self
    }

    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing metrics instance instead of creating one
    pub fn metrics(mut self, metrics: Arc<CoordinatorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<Coordinator<R>, CoordinatorError> {
        if !self.platform.is_owner_thread() {
            return Err(CoordinatorError::NotOnUiThread);
        }

        if self.config.poll_interval_ms == 0 {
            return Err(CoordinatorError::InvalidConfig(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        let surface: Rc<dyn WaitSurface> = match self.surface {
            SurfaceChoice::Unset => return Err(CoordinatorError::MissingSurface),
            SurfaceChoice::Default => Rc::new(TextWaitSurface::new(Rc::clone(&self.platform))),
            SurfaceChoice::Custom(surface) => surface,
        };

        let metrics = self.metrics.unwrap_or_default();
        let user_cancel = surface.cancel_flag();
        let surface_ref = UiBound::new(surface);

        let marshaller = Marshaller::new(
            self.platform.dispatcher(),
            surface_ref.clone(),
            Arc::clone(&metrics),
        );
        let status: Arc<dyn RunnerStatus> = self.runner.clone();
        let reporter = ProgressReporter::new(marshaller, user_cancel.clone(), status);

        let watcher = CompletionWatcher::new(
            Rc::clone(&self.platform),
            self.config.poll_interval(),
            Arc::clone(&metrics),
        );

        tracing::debug!(
            "Coordinator built (grace {:?}, poll {:?})",
            self.config.grace_period(),
            self.config.poll_interval()
        );

        Ok(Coordinator {
            platform: self.platform,
            runner: self.runner,
            surface: surface_ref,
            user_cancel,
            watcher,
            reporter,
            config: self.config,
            metrics,
            disposed: Cell::new(false),
        })
    }
}

/// Owns a wait surface and runs a [`TaskRunner`] behind it
///
/// Lives on the UI thread (it is `!Send`). Hand [`reporter`](Self::reporter)
/// clones to other threads for progress and cancellation.
///
/// # Example
/// ```ignore
/// let coordinator = Coordinator::builder(event_loop.clone(), runner)
///     .default_surface()
///     .build()?;
///
/// coordinator.set_message("Copying files");
/// coordinator.set_bar_style(BarStyle::Determinate);
/// coordinator.start(Some(job))?; // returns once the task has finished
/// ```
pub struct Coordinator<R: TaskRunner + 'static> {
    platform: Rc<dyn UiPlatform>,
    runner: Arc<R>,
    surface: UiBound<dyn WaitSurface>,
    user_cancel: CancelFlag,
    watcher: CompletionWatcher,
    reporter: ProgressReporter,
    config: CoordinatorConfig,
    metrics: Arc<CoordinatorMetrics>,
    disposed: Cell<bool>,
}

impl<R: TaskRunner + 'static> Coordinator<R> {
    pub fn builder(platform: Rc<dyn UiPlatform>, runner: Arc<R>) -> CoordinatorBuilder<R> {
        CoordinatorBuilder {
            platform,
            runner,
            surface: SurfaceChoice::Unset,
            config: CoordinatorConfig::default(),
            metrics: None,
        }
    }

    /// Run the task, showing the wait surface if it outlives the grace period.
    ///
    /// Returns once the task has finished (or immediately after the grace
    /// period for fast tasks). The task's own result is delivered through
    /// the runner's completion callback, not here.
    pub fn start(&self, argument: Option<R::Argument>) -> Result<(), CoordinatorError> {
        if !self.platform.is_owner_thread() {
            return Err(CoordinatorError::NotOnUiThread);
        }
        let surface = self.surface.get().ok_or(CoordinatorError::Disposed)?;

        surface.set_cancel_control_visible(self.runner.supports_cancellation());
        self.user_cancel.clear();

        self.runner.start(argument, self.reporter.clone())?;
        self.metrics.record_run_started();
        tracing::info!("Task started");

        let status: Arc<dyn RunnerStatus> = self.runner.clone();
        self.watcher.start(status, Rc::clone(&surface));

        self.platform.sleep(self.config.grace_period());

        if !self.runner.is_busy() {
            self.metrics.record_fast_completion();
            tracing::debug!("Task finished within the grace period");
            return Ok(());
        }

        self.metrics.record_surface_shown();
        let shown_at = Instant::now();
        surface.show();
        self.metrics.record_modal_time(shown_at.elapsed());

        tracing::info!("Wait surface closed after {:?}", shown_at.elapsed());
        Ok(())
    }

    /// Runner-level OR user-level cancellation. Once disposed the user half
    /// reads `false` but the runner's own request still counts.
    pub fn is_cancellation_pending(&self) -> bool {
        self.reporter.is_cancellation_pending()
    }

    /// Ask the runner to stop cooperatively
    pub fn request_cancel(&self) -> Result<(), CoordinatorError> {
        self.runner.request_cancel()?;
        Ok(())
    }

    /// Thread-safe progress handle for this coordinator's surface
    pub fn reporter(&self) -> ProgressReporter {
        self.reporter.clone()
    }

    pub fn metrics(&self) -> Arc<CoordinatorMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn runner(&self) -> &Arc<R> {
        &self.runner
    }

    pub fn is_surface_visible(&self) -> bool {
        self.surface
            .with(|surface| surface.is_visible())
            .unwrap_or(false)
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.reporter.set_message(message);
    }

    pub fn set_bar_visible(&self, visible: bool) {
        self.reporter.set_bar_visible(visible);
    }

    pub fn set_bar_style(&self, style: BarStyle) {
        self.reporter.set_bar_style(style);
    }

    pub fn set_bar_value(&self, value: i32) {
        self.reporter.set_bar_value(value);
    }

    pub fn bar_value(&self) -> Result<i32, CoordinatorError> {
        Ok(self.reporter.bar_value()?)
    }

    pub fn set_bar_step(&self, step: i32) {
        self.reporter.set_bar_step(step);
    }

    pub fn perform_step(&self) {
        self.reporter.perform_step();
    }

    pub fn set_bar_minimum(&self, minimum: i32) {
        self.reporter.set_bar_minimum(minimum);
    }

    pub fn set_bar_maximum(&self, maximum: i32) {
        self.reporter.set_bar_maximum(maximum);
    }

    pub fn set_cancel_control_visible(&self, visible: bool) {
        self.reporter.set_cancel_control_visible(visible);
    }

    /// Stop the watcher and release the surface. Safe to call repeatedly.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }

        self.watcher.stop();
        self.reporter.release_surface();

        if let Some(surface) = self.surface.release() {
            if surface.is_visible() {
                surface.hide();
            }
            surface.dispose();
        }

        tracing::debug!("Coordinator disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

impl<R: TaskRunner + 'static> Drop for Coordinator<R> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<R: TaskRunner + 'static> fmt::Debug for Coordinator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .field("disposed", &self.disposed.get())
            .field("watching", &self.watcher.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::EventLoop;
    use mockall::mock;
    use mockall::predicate::{always, eq};
    use std::sync::atomic::Ordering::Relaxed;

    mock! {
        pub Runner {}

        impl RunnerStatus for Runner {
            fn is_busy(&self) -> bool;
            fn is_cancel_requested(&self) -> bool;
        }

        impl TaskRunner for Runner {
            type Argument = u32;

            fn start(&self, argument: Option<u32>, reporter: ProgressReporter) -> Result<(), RunnerError>;
            fn supports_cancellation(&self) -> bool;
            fn request_cancel(&self) -> Result<(), RunnerError>;
        }
    }

    fn fast_config() -> CoordinatorConfig {
        CoordinatorConfig {
            grace_period_ms: 5,
            poll_interval_ms: 5,
        }
    }

    fn coordinator(runner: MockRunner) -> (Rc<EventLoop>, Coordinator<MockRunner>) {
        let event_loop = Rc::new(EventLoop::new());
        let coordinator = Coordinator::builder(event_loop.clone(), Arc::new(runner))
            .default_surface()
            .config(fast_config())
            .build()
            .unwrap();
        (event_loop, coordinator)
    }

    #[test]
    fn test_build_without_surface_fails() {
        let event_loop = Rc::new(EventLoop::new());
        let result = Coordinator::builder(event_loop, Arc::new(MockRunner::new())).build();

        assert_eq!(result.err(), Some(CoordinatorError::MissingSurface));
    }

    #[test]
    fn test_build_with_zero_poll_interval_fails() {
        let event_loop = Rc::new(EventLoop::new());
        let result = Coordinator::builder(event_loop, Arc::new(MockRunner::new()))
            .default_surface()
            .config(CoordinatorConfig {
                grace_period_ms: 0,
                poll_interval_ms: 0,
            })
            .build();

        assert!(matches!(result, Err(CoordinatorError::InvalidConfig(_))));
    }

    #[test]
    fn test_fast_task_never_shows_surface() {
        let mut runner = MockRunner::new();
        runner.expect_supports_cancellation().return_const(false);
        runner
            .expect_start()
            .with(eq(Some(7)), always())
            .times(1)
            .returning(|_, _| Ok(()));
        runner.expect_is_busy().return_const(false);

        let (_loop, coordinator) = coordinator(runner);
        coordinator.start(Some(7)).unwrap();

        let metrics = coordinator.metrics();
        assert_eq!(metrics.runs_started.load(Relaxed), 1);
        assert_eq!(metrics.fast_completions.load(Relaxed), 1);
        assert_eq!(metrics.surface_shows.load(Relaxed), 0);
        assert!(!coordinator.is_surface_visible());
    }

    #[test]
    fn test_rejected_start_surfaces_runner_error() {
        let mut runner = MockRunner::new();
        runner.expect_supports_cancellation().return_const(true);
        runner
            .expect_start()
            .returning(|_, _| Err(RunnerError::Busy));

        let (_loop, coordinator) = coordinator(runner);

        assert_eq!(
            coordinator.start(None),
            Err(CoordinatorError::Runner(RunnerError::Busy))
        );
        // Steps before the runner start still ran
        assert_eq!(
            coordinator.reporter().progress().map(|p| p.cancel_control_visible),
            Ok(true)
        );
    }

    #[test]
    fn test_cancellation_pending_before_start_is_false() {
        let mut runner = MockRunner::new();
        runner.expect_is_cancel_requested().return_const(false);

        let (_loop, coordinator) = coordinator(runner);
        assert!(!coordinator.is_cancellation_pending());
    }

    #[test]
    fn test_start_clears_previous_user_cancel() {
        let mut runner = MockRunner::new();
        runner.expect_supports_cancellation().return_const(true);
        runner.expect_start().returning(|_, _| Ok(()));
        runner.expect_is_busy().return_const(false);
        runner.expect_is_cancel_requested().return_const(false);

        let (_loop, coordinator) = coordinator(runner);
        coordinator
            .surface
            .with(|surface| surface.set_cancel_requested(true));
        assert!(coordinator.is_cancellation_pending());

        coordinator.start(None).unwrap();
        assert!(!coordinator.is_cancellation_pending());
    }

    #[test]
    fn test_request_cancel_without_support() {
        let mut runner = MockRunner::new();
        runner
            .expect_request_cancel()
            .returning(|| Err(RunnerError::CancellationNotSupported));

        let (_loop, coordinator) = coordinator(runner);
        assert_eq!(
            coordinator.request_cancel(),
            Err(CoordinatorError::Runner(RunnerError::CancellationNotSupported))
        );
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut runner = MockRunner::new();
        runner.expect_is_cancel_requested().return_const(false);

        let (_loop, coordinator) = coordinator(runner);
        coordinator
            .surface
            .with(|surface| surface.set_cancel_requested(true));
        coordinator.dispose();
        coordinator.dispose();

        assert!(coordinator.is_disposed());
        assert!(!coordinator.is_cancellation_pending());
        assert_eq!(coordinator.start(Some(1)), Err(CoordinatorError::Disposed));
        assert_eq!(
            coordinator.bar_value(),
            Err(CoordinatorError::Marshal(MarshalError::TargetReleased))
        );
    }

    #[test]
    fn test_runner_cancel_survives_dispose() {
        let mut runner = MockRunner::new();
        runner.expect_request_cancel().times(1).returning(|| Ok(()));
        runner.expect_is_cancel_requested().return_const(true);

        let (_loop, coordinator) = coordinator(runner);
        coordinator.request_cancel().unwrap();
        coordinator.dispose();

        assert!(coordinator.is_cancellation_pending());
        assert!(coordinator.reporter().is_cancellation_pending());
        assert!(!coordinator.reporter().is_user_cancel_requested());
    }
}
