// CompletionWatcher - UI-thread poll that hides the wait surface
//
// The runner's completion callback runs on a background thread, so it never
// touches the surface. Instead a recurring UI timer polls the busy flag and
// hides the surface from the UI thread's own loop once the runner is idle.

use crate::metrics::CoordinatorMetrics;
use crate::platform::{TimerFlow, TimerId, UiPlatform};
use crate::services::RunnerStatus;
use crate::ui::surface::WaitSurface;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

pub struct CompletionWatcher {
    platform: Rc<dyn UiPlatform>,
    timer: Rc<Cell<Option<TimerId>>>,
    interval: Duration,
    metrics: Arc<CoordinatorMetrics>,
}

impl CompletionWatcher {
    pub fn new(
        platform: Rc<dyn UiPlatform>,
        interval: Duration,
        metrics: Arc<CoordinatorMetrics>,
    ) -> Self {
        Self {
            platform,
            timer: Rc::new(Cell::new(None)),
            interval,
            metrics,
        }
    }

    /// Start polling `runner`. A no-op while already polling.
    pub fn start(&self, runner: Arc<dyn RunnerStatus>, surface: Rc<dyn WaitSurface>) {
        if self.is_running() {
            tracing::debug!("Completion watcher already running");
            return;
        }

        let timer = Rc::clone(&self.timer);
        let metrics = Arc::clone(&self.metrics);

        let id = self.platform.start_timer(
            self.interval,
            Box::new(move || {
                metrics.record_watcher_tick();
                if runner.is_busy() {
                    return TimerFlow::Continue;
                }

                timer.set(None);
                if surface.is_visible() {
                    metrics.record_surface_hidden();
                }
                tracing::debug!("Runner idle; hiding wait surface");
                surface.hide();
                TimerFlow::Stop
            }),
        );

        tracing::debug!("Completion watcher started ({}, every {:?})", id, self.interval);
        self.timer.set(Some(id));
    }

    pub fn stop(&self) {
        if let Some(id) = self.timer.take() {
            self.platform.stop_timer(id);
            tracing::debug!("Completion watcher stopped ({})", id);
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .get()
            .is_some_and(|id| self.platform.is_timer_active(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::EventLoop;
    use crate::ui::surface::TextWaitSurface;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::atomic::Ordering::Relaxed;

    #[derive(Default)]
    struct FakeStatus {
        busy: AtomicBool,
    }

    impl RunnerStatus for FakeStatus {
        fn is_busy(&self) -> bool {
            self.busy.load(Ordering::SeqCst)
        }

        fn is_cancel_requested(&self) -> bool {
            false
        }
    }

    fn watcher(event_loop: &Rc<EventLoop>) -> (CompletionWatcher, Arc<CoordinatorMetrics>) {
        let metrics = Arc::new(CoordinatorMetrics::new());
        let watcher = CompletionWatcher::new(
            event_loop.clone(),
            Duration::from_millis(5),
            metrics.clone(),
        );
        (watcher, metrics)
    }

    #[test]
    fn test_hides_surface_once_runner_idle() {
        let event_loop = Rc::new(EventLoop::new());
        let (watcher, metrics) = watcher(&event_loop);
        let surface = Rc::new(TextWaitSurface::new(event_loop.clone()));
        let status = Arc::new(FakeStatus::default());
        status.busy.store(true, Ordering::SeqCst);

        watcher.start(status.clone(), surface.clone());
        assert!(watcher.is_running());

        // Go idle a few ticks into the modal show
        let remote = status.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            remote.busy.store(false, Ordering::SeqCst);
        });

        surface.show();

        assert!(!surface.is_visible());
        assert!(!watcher.is_running());
        assert_eq!(metrics.surface_hides.load(Relaxed), 1);
        assert!(metrics.watcher_ticks.load(Relaxed) >= 2);
    }

    #[test]
    fn test_start_twice_keeps_one_timer() {
        let event_loop = Rc::new(EventLoop::new());
        let (watcher, _metrics) = watcher(&event_loop);
        let surface = Rc::new(TextWaitSurface::new(event_loop.clone()));
        let status = Arc::new(FakeStatus::default());
        status.busy.store(true, Ordering::SeqCst);

        watcher.start(status.clone(), surface.clone());
        watcher.start(status.clone(), surface.clone());

        assert_eq!(event_loop.active_timers(), 1);

        watcher.stop();
        assert!(!watcher.is_running());
        assert_eq!(event_loop.active_timers(), 0);
    }

    #[test]
    fn test_idle_runner_with_hidden_surface_counts_no_hide() {
        let event_loop = Rc::new(EventLoop::new());
        let (watcher, metrics) = watcher(&event_loop);
        let surface = Rc::new(TextWaitSurface::new(event_loop.clone()));

        watcher.start(Arc::new(FakeStatus::default()), surface);
        event_loop.run_until(&|| !watcher.is_running());

        assert_eq!(metrics.watcher_ticks.load(Relaxed), 1);
        assert_eq!(metrics.surface_hides.load(Relaxed), 0);
    }
}
