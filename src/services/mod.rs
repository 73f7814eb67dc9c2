//! Services module - task execution behind the coordinator.
//!
//! The coordinator never runs work itself. It drives anything implementing
//! [`TaskRunner`] and only ever observes it through [`RunnerStatus`].
//!
//! # Components
//!
//! - [`TaskRunner`]: start a task body off the calling thread, with an
//!   optional argument and a [`ProgressReporter`](crate::ui::ProgressReporter)
//! - [`RunnerStatus`]: the busy and cancel-requested flags, the only state
//!   the completion watcher polls
//! - [`BackgroundRunner`]: the bundled runner on tokio's blocking pool:
//!   - atomic busy flag (a second start while busy is rejected)
//!   - cooperative cancellation over a `tokio::sync::watch` channel
//!   - panics in the task body become [`TaskOutcome::Failed`]
//!   - the completion callback runs on the worker thread, after the runner
//!     went idle
//!
//! # Usage Example
//!
//! ```ignore
//! use waitrun::services::{BackgroundRunner, WorkContext};
//!
//! let runner = BackgroundRunner::builder(runtime.handle().clone(), |ctx: WorkContext<u32>| {
//!     let count = ctx.argument().copied().unwrap_or(10);
//!     for _ in 0..count {
//!         ctx.check_cancelled()?;
//!         ctx.reporter().perform_step();
//!     }
//!     Ok(count)
//! })
//! .supports_cancellation(true)
//! .on_completed(|outcome| tracing::info!("finished: {}", outcome.is_completed()))
//! .build();
//! ```

pub mod runner;

pub use runner::{
    BackgroundRunner, BackgroundRunnerBuilder, RunnerError, RunnerStatus, TaskOutcome, TaskRunner,
    WorkContext, WorkError,
};
