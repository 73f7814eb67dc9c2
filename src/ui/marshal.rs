// Marshaller - runs calls against a UI-thread value from any thread
//
// This is the cross-thread half of the coordinator:
// 1. On the UI thread, calls run inline (never queue to ourselves and wait,
//    that would deadlock the loop that has to service the queue)
// 2. Elsewhere, writes are posted fire-and-forget
// 3. Elsewhere, reads are posted and the caller blocks for the answer

use crate::metrics::CoordinatorMetrics;
use crate::platform::{Dispatch, PlatformError, UiBound};
use std::sync::Arc;
use thiserror::Error;

/// Errors from a blocking round-trip to the UI thread
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    #[error("UI event loop has shut down")]
    LoopClosed,

    #[error("UI target was released before the call ran")]
    TargetReleased,
}

impl From<PlatformError> for MarshalError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::LoopClosed => MarshalError::LoopClosed,
        }
    }
}

/// Marshals calls onto the UI thread that owns `T`
///
/// Cloneable and `Send + Sync` regardless of `T`: it only carries the
/// dispatcher and a [`UiBound`] token, never the value itself.
///
/// # Example
/// ```ignore
/// let marshaller = Marshaller::new(event_loop.dispatcher(), surface_ref, metrics);
///
/// std::thread::spawn(move || {
///     marshaller.post(|surface| surface.set_message("Copying files"));
///     let value = marshaller.send(|surface| surface.bar_value())?;
/// });
/// ```
pub struct Marshaller<T: ?Sized + 'static> {
    dispatcher: Arc<dyn Dispatch>,
    target: UiBound<T>,
    metrics: Arc<CoordinatorMetrics>,
}

impl<T: ?Sized + 'static> Marshaller<T> {
    pub fn new(
        dispatcher: Arc<dyn Dispatch>,
        target: UiBound<T>,
        metrics: Arc<CoordinatorMetrics>,
    ) -> Self {
        Self {
            dispatcher,
            target,
            metrics,
        }
    }

    pub fn is_on_owner_thread(&self) -> bool {
        self.dispatcher.is_owner_thread()
    }

    /// Run `action` on the UI thread without waiting for it.
    ///
    /// Inline when already on the UI thread. Calls from one thread are
    /// applied in the order they were made. Dropped (with a log line) when
    /// the loop is gone or the target was released.
    pub fn post<F>(&self, action: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        if self.is_on_owner_thread() {
            match self.target.with(action) {
                Some(()) => self.metrics.record_inline_update(),
                None => {
                    self.metrics.record_dropped_update();
                    tracing::debug!("UI target released - dropping inline update");
                }
            }
            return;
        }

        let target = self.target.clone();
        let metrics = Arc::clone(&self.metrics);
        let job = Box::new(move || {
            if target.with(action).is_none() {
                metrics.record_dropped_update();
                tracing::debug!("UI target released - dropping queued update");
            }
        });

        match self.dispatcher.post(job) {
            Ok(()) => self.metrics.record_posted_update(),
            Err(e) => {
                self.metrics.record_dropped_update();
                tracing::warn!("Failed to queue UI update: {}", e);
            }
        }
    }

    /// Run `function` on the UI thread and wait for its result.
    ///
    /// Inline when already on the UI thread, so a UI-thread caller can never
    /// block on a queue only it could drain.
    pub fn send<R, F>(&self, function: F) -> Result<R, MarshalError>
    where
        F: FnOnce(&T) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_on_owner_thread() {
            return self.target.with(function).ok_or(MarshalError::TargetReleased);
        }

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let target = self.target.clone();

        self.dispatcher.post(Box::new(move || {
            let result = target.with(function).ok_or(MarshalError::TargetReleased);
            // The caller only goes away if its thread died
            let _ = reply_tx.send(result);
        }))?;
        self.metrics.record_round_trip();

        // A queued job dropped unrun (loop torn down) drops reply_tx with it
        reply_rx.recv().map_err(|_| MarshalError::LoopClosed)?
    }
}

// Manual Clone implementation to avoid requiring T: Clone
impl<T: ?Sized + 'static> Clone for Marshaller<T> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            target: self.target.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}
