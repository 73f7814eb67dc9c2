use crate::models::CancellationFlags;
use crate::ui::ProgressReporter;
use anyhow::anyhow;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::watch;

/// Observable state of a task runner
///
/// This is all the completion watcher and the progress reporters need, so
/// they hold it type-erased as `Arc<dyn RunnerStatus>`.
pub trait RunnerStatus: Send + Sync {
    /// True from `start` until the task body has returned
    fn is_busy(&self) -> bool;

    /// True once cooperative cancellation was requested for the current run
    fn is_cancel_requested(&self) -> bool;
}

/// Asynchronous task execution primitive consumed by the coordinator
pub trait TaskRunner: RunnerStatus {
    /// Argument handed to the task body
    type Argument: Send + 'static;

    /// Start the task body off the calling thread.
    ///
    /// Must mark the runner busy before returning.
    fn start(
        &self,
        argument: Option<Self::Argument>,
        reporter: ProgressReporter,
    ) -> Result<(), RunnerError>;

    /// Whether the task body honours cooperative cancellation
    fn supports_cancellation(&self) -> bool;

    fn request_cancel(&self) -> Result<(), RunnerError>;
}

/// Errors from starting or cancelling a runner
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("Task runner is already busy")]
    Busy,

    #[error("Task runner does not support cancellation")]
    CancellationNotSupported,
}

/// How a task body ended, as returned by the body itself
#[derive(Error, Debug)]
pub enum WorkError {
    #[error("Task cancelled")]
    Cancelled,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Result delivered to the completion callback
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Completed(T),
    Cancelled,
    Failed(anyhow::Error),
}

impl<T> TaskOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskOutcome::Cancelled)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }

    fn from_result(result: Result<T, WorkError>) -> Self {
        match result {
            Ok(value) => TaskOutcome::Completed(value),
            Err(WorkError::Cancelled) => TaskOutcome::Cancelled,
            Err(WorkError::Failed(err)) => TaskOutcome::Failed(err),
        }
    }
}

/// What the task body sees while it runs
pub struct WorkContext<A> {
    argument: Option<A>,
    reporter: ProgressReporter,
    cancel_rx: watch::Receiver<bool>,
}

impl<A> WorkContext<A> {
    pub fn argument(&self) -> Option<&A> {
        self.argument.as_ref()
    }

    pub fn take_argument(&mut self) -> Option<A> {
        self.argument.take()
    }

    /// Marshalled progress accessors for the wait surface
    pub fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    /// Runner-level OR user-level cancellation, read fresh on every call
    pub fn is_cancellation_pending(&self) -> bool {
        CancellationFlags {
            runner_cancel_requested: *self.cancel_rx.borrow(),
            user_cancel_requested: self.reporter.is_user_cancel_requested(),
        }
        .is_pending()
    }

    /// `Err(WorkError::Cancelled)` once cancellation is pending, for use with `?`
    pub fn check_cancelled(&self) -> Result<(), WorkError> {
        if self.is_cancellation_pending() {
            Err(WorkError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Receiver for the runner-level cancel signal, for bodies that await
    /// async work with `tokio::select!`
    pub fn cancel_receiver(&self) -> watch::Receiver<bool> {
        self.cancel_rx.clone()
    }
}

type WorkFn<A, T> = dyn Fn(WorkContext<A>) -> Result<T, WorkError> + Send + Sync;
type CompletionFn<T> = dyn Fn(TaskOutcome<T>) + Send + Sync;

/// Task runner backed by tokio's blocking thread pool
///
/// # Example
/// ```ignore
/// let runner = BackgroundRunner::builder(runtime.handle().clone(), |ctx: WorkContext<u32>| {
///     for i in 0..ctx.argument().copied().unwrap_or(10) {
///         ctx.check_cancelled()?;
///         ctx.reporter().perform_step();
///     }
///     Ok(())
/// })
/// .supports_cancellation(true)
/// .on_completed(|outcome| tracing::info!("done: {:?}", outcome.is_completed()))
/// .build();
/// ```
pub struct BackgroundRunner<A, T> {
    tokio_handle: tokio::runtime::Handle,
    work: Arc<WorkFn<A, T>>,
    on_completed: Option<Arc<CompletionFn<T>>>,
    supports_cancellation: bool,
    busy: Arc<AtomicBool>,
    cancel_tx: watch::Sender<bool>,
}

/// Builder for [`BackgroundRunner`]
pub struct BackgroundRunnerBuilder<A, T> {
    tokio_handle: tokio::runtime::Handle,
    work: Arc<WorkFn<A, T>>,
    on_completed: Option<Arc<CompletionFn<T>>>,
    supports_cancellation: bool,
}

impl<A, T> BackgroundRunnerBuilder<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    pub fn supports_cancellation(mut self, supported: bool) -> Self {
        self.supports_cancellation = supported;
        self
    }

    /// Callback run on the background thread after the body returned and
    /// the runner went idle
    pub fn on_completed<F>(mut self, callback: F) -> Self
    where
        F: Fn(TaskOutcome<T>) + Send + Sync + 'static,
    {
        self.on_completed = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> BackgroundRunner<A, T> {
        let (cancel_tx, _) = watch::channel(false);
        BackgroundRunner {
            tokio_handle: self.tokio_handle,
            work: self.work,
            on_completed: self.on_completed,
            supports_cancellation: self.supports_cancellation,
            busy: Arc::new(AtomicBool::new(false)),
            cancel_tx,
        }
    }
}

impl<A, T> BackgroundRunner<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    pub fn builder<F>(tokio_handle: tokio::runtime::Handle, work: F) -> BackgroundRunnerBuilder<A, T>
    where
        F: Fn(WorkContext<A>) -> Result<T, WorkError> + Send + Sync + 'static,
    {
        BackgroundRunnerBuilder {
            tokio_handle,
            work: Arc::new(work),
            on_completed: None,
            supports_cancellation: false,
        }
    }
}

impl<A, T> RunnerStatus for BackgroundRunner<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn is_cancel_requested(&self) -> bool {
        *self.cancel_tx.borrow()
    }
}

impl<A, T> TaskRunner for BackgroundRunner<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    type Argument = A;

    fn start(&self, argument: Option<A>, reporter: ProgressReporter) -> Result<(), RunnerError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RunnerError::Busy);
        }

        // A previous run's cancel request must not leak into this one
        self.cancel_tx.send_replace(false);

        let context = WorkContext {
            argument,
            reporter,
            cancel_rx: self.cancel_tx.subscribe(),
        };
        let work = Arc::clone(&self.work);
        let on_completed = self.on_completed.clone();
        let busy = BusyGuard(Arc::clone(&self.busy));

        tracing::debug!("Scheduling task body on the blocking pool");

        // Dropped unrun if the runtime is shutting down; the guard clears busy
        drop(self.tokio_handle.spawn_blocking(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| work(context)));
            let outcome = match result {
                Ok(result) => TaskOutcome::from_result(result),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!("Task body panicked: {}", message);
                    TaskOutcome::Failed(anyhow!("Task body panicked: {}", message))
                }
            };

            // Idle first, so the watcher may hide as soon as the callback runs
            drop(busy);

            tracing::debug!(
                "Task body finished: completed={}, cancelled={}, failed={}",
                outcome.is_completed(),
                outcome.is_cancelled(),
                outcome.is_failed()
            );

            if let Some(callback) = on_completed {
                callback(outcome);
            }
        }));

        Ok(())
    }

    fn supports_cancellation(&self) -> bool {
        self.supports_cancellation
    }

    fn request_cancel(&self) -> Result<(), RunnerError> {
        if !self.supports_cancellation {
            return Err(RunnerError::CancellationNotSupported);
        }

        tracing::info!("Cancellation requested via runner");
        self.cancel_tx.send_replace(true);
        Ok(())
    }
}

impl<A, T> fmt::Debug for BackgroundRunner<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundRunner")
            .field("busy", &self.busy.load(Ordering::SeqCst))
            .field("supports_cancellation", &self.supports_cancellation)
            .finish()
    }
}

/// Clears the busy flag however the task body ends
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
