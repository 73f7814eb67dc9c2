// Coordination metrics module
//
// Lightweight counters describing how runs and progress updates flowed
// between the UI thread and background threads

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters shared by a coordinator, its marshaller and its watcher
///
/// Uses atomic operations for thread-safe tracking without locks; background
/// threads record posted updates while the UI thread records shows and hides.
#[derive(Debug)]
pub struct CoordinatorMetrics {
    /// Runs handed to the task runner
    pub runs_started: AtomicU64,

    /// Runs that were already idle when the grace period ended
    pub fast_completions: AtomicU64,

    /// Times the wait surface was shown
    pub surface_shows: AtomicU64,

    /// Times the completion watcher hid the wait surface
    pub surface_hides: AtomicU64,

    /// Completion watcher ticks
    pub watcher_ticks: AtomicU64,

    /// Progress writes queued from a background thread
    pub updates_posted: AtomicU64,

    /// Progress writes applied directly on the UI thread
    pub updates_inline: AtomicU64,

    /// Blocking reads answered by the UI thread
    pub round_trips: AtomicU64,

    /// Progress writes lost because the loop or the surface was gone
    pub updates_dropped: AtomicU64,

    /// Time spent inside the modal show, in milliseconds
    pub total_modal_time_ms: AtomicU64,

    start_time: Instant,
}

impl CoordinatorMetrics {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            fast_completions: AtomicU64::new(0),
            surface_shows: AtomicU64::new(0),
            surface_hides: AtomicU64::new(0),
            watcher_ticks: AtomicU64::new(0),
            updates_posted: AtomicU64::new(0),
            updates_inline: AtomicU64::new(0),
            round_trips: AtomicU64::new(0),
            updates_dropped: AtomicU64::new(0),
            total_modal_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fast_completion(&self) {
        self.fast_completions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_surface_shown(&self) {
        self.surface_shows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_surface_hidden(&self) {
        self.surface_hides.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_watcher_tick(&self) {
        self.watcher_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_posted_update(&self) {
        self.updates_posted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inline_update(&self) {
        self.updates_inline.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_round_trip(&self) {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_update(&self) {
        self.updates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_modal_time(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.total_modal_time_ms.fetch_add(millis, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average time the surface stayed up per show, in milliseconds
    pub fn avg_modal_time_ms(&self) -> f64 {
        let total = self.total_modal_time_ms.load(Ordering::Relaxed);
        let count = self.surface_shows.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Coordinator Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Runs: {} started, {} finished within grace period",
            self.runs_started.load(Ordering::Relaxed),
            self.fast_completions.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Surface: {} shows, {} hides, {} watcher ticks (avg modal {:.2}ms)",
            self.surface_shows.load(Ordering::Relaxed),
            self.surface_hides.load(Ordering::Relaxed),
            self.watcher_ticks.load(Ordering::Relaxed),
            self.avg_modal_time_ms()
        );
        tracing::info!(
            "Updates: {} posted, {} inline, {} round-trips, {} dropped",
            self.updates_posted.load(Ordering::Relaxed),
            self.updates_inline.load(Ordering::Relaxed),
            self.round_trips.load(Ordering::Relaxed),
            self.updates_dropped.load(Ordering::Relaxed)
        );
    }
}

impl Default for CoordinatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}
