// EventLoop - the bundled UI thread message loop
//
// A crossbeam channel carries jobs from any thread to the UI thread; timers
// live in a table owned by the UI thread and fire between jobs. The loop can
// be entered recursively (run_modal), which is how a modal wait surface keeps
// the UI thread serviced while it blocks its caller.

use super::{Dispatch, Job, PlatformError, TimerFlow, TimerId, TimerTick, UiPlatform};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

enum LoopMessage {
    Invoke(Job),
    Quit,
}

struct TimerEntry {
    interval: Duration,
    due: Instant,
    tick: Rc<RefCell<TimerTick>>,
}

/// Cloneable, thread-safe handle for queueing work onto an [`EventLoop`]
#[derive(Clone)]
pub struct LoopDispatcher {
    owner: ThreadId,
    sender: Sender<LoopMessage>,
}

impl LoopDispatcher {
    /// Ask every active level of the loop to return
    pub fn quit(&self) -> Result<(), PlatformError> {
        self.sender
            .send(LoopMessage::Quit)
            .map_err(|_| PlatformError::LoopClosed)
    }
}

impl Dispatch for LoopDispatcher {
    fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn post(&self, job: Job) -> Result<(), PlatformError> {
        self.sender
            .send(LoopMessage::Invoke(job))
            .map_err(|_| PlatformError::LoopClosed)
    }
}

/// Single-threaded message loop owned by the UI thread
///
/// The thread that calls [`EventLoop::new`] becomes the UI thread. The loop is
/// deliberately `!Send`: timers and the values they capture never leave it.
///
/// # Example
/// ```ignore
/// let event_loop = EventLoop::new();
/// let dispatcher = event_loop.dispatcher_handle();
///
/// std::thread::spawn(move || {
///     dispatcher.post(Box::new(|| tracing::info!("on the UI thread"))).ok();
///     dispatcher.quit().ok();
/// });
///
/// event_loop.run();
/// ```
pub struct EventLoop {
    owner: ThreadId,
    dispatcher: Arc<LoopDispatcher>,
    receiver: Receiver<LoopMessage>,
    timers: RefCell<IndexMap<TimerId, TimerEntry>>,
    next_timer: Cell<u64>,
    quit_requested: Cell<bool>,
    depth: Cell<usize>,
    _not_send: PhantomData<Rc<()>>,
}

impl EventLoop {
    /// Create a loop owned by the current thread
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let owner = thread::current().id();

        tracing::debug!("Event loop created on {:?}", owner);

        Self {
            owner,
            dispatcher: Arc::new(LoopDispatcher { owner, sender }),
            receiver,
            timers: RefCell::new(IndexMap::new()),
            next_timer: Cell::new(1),
            quit_requested: Cell::new(false),
            depth: Cell::new(0),
            _not_send: PhantomData,
        }
    }

    /// Concrete dispatcher handle (also reachable as `Arc<dyn Dispatch>`)
    pub fn dispatcher_handle(&self) -> LoopDispatcher {
        LoopDispatcher::clone(&self.dispatcher)
    }

    /// Run until [`quit`](Self::quit) or [`LoopDispatcher::quit`] is called
    pub fn run(&self) {
        tracing::debug!("Event loop running");
        self.run_until(&|| false);
        self.quit_requested.set(false);
        tracing::debug!("Event loop stopped");
    }

    /// Service jobs and timers until `until` holds or quit is requested.
    ///
    /// Returns `true` if the predicate was satisfied, `false` on quit.
    pub fn run_until(&self, until: &dyn Fn() -> bool) -> bool {
        self.depth.set(self.depth.get() + 1);

        while !until() && !self.quit_requested.get() {
            self.wait_once(None);
        }

        self.depth.set(self.depth.get() - 1);
        !self.quit_requested.get()
    }

    /// Service the loop for a fixed wall-clock duration
    pub fn run_for(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline && !self.quit_requested.get() {
            self.wait_once(Some(deadline));
        }
    }

    /// Run due timers and every job already queued, without blocking.
    ///
    /// Returns the number of jobs and ticks processed.
    pub fn run_pending(&self) -> usize {
        let mut processed = self.fire_due_timers();

        // Jobs queued by the jobs we run now wait for the next call
        let queued = self.receiver.len();
        for _ in 0..queued {
            match self.receiver.try_recv() {
                Ok(message) => {
                    self.handle(message);
                    processed += 1;
                }
                Err(_) => break,
            }
        }

        processed + self.fire_due_timers()
    }

    /// Request every active loop level to return
    pub fn quit(&self) {
        self.quit_requested.set(true);
    }

    /// Nesting depth of currently running loops (0 when idle)
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    pub fn active_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    fn wait_once(&self, limit: Option<Instant>) {
        self.fire_due_timers();

        let deadline = match (self.next_timer_due(), limit) {
            (Some(timer), Some(limit)) => Some(timer.min(limit)),
            (timer, limit) => timer.or(limit),
        };

        let message = match deadline {
            Some(deadline) => match self.receiver.recv_deadline(deadline) {
                Ok(message) => Some(message),
                Err(RecvTimeoutError::Timeout) => None,
                // We hold a sender ourselves, so this cannot happen
                Err(RecvTimeoutError::Disconnected) => None,
            },
            None => self.receiver.recv().ok(),
        };

        if let Some(message) = message {
            self.handle(message);
        }

        self.fire_due_timers();
    }

    fn handle(&self, message: LoopMessage) {
        match message {
            LoopMessage::Invoke(job) => job(),
            LoopMessage::Quit => {
                tracing::debug!("Quit requested at loop depth {}", self.depth.get());
                self.quit_requested.set(true);
            }
        }
    }

    fn next_timer_due(&self) -> Option<Instant> {
        self.timers.borrow().values().map(|entry| entry.due).min()
    }

    fn fire_due_timers(&self) -> usize {
        let now = Instant::now();

        let due: Vec<(TimerId, Rc<RefCell<TimerTick>>)> = self
            .timers
            .borrow_mut()
            .iter_mut()
            .filter(|(_, entry)| entry.due <= now)
            .map(|(id, entry)| {
                entry.due = now + entry.interval;
                (*id, Rc::clone(&entry.tick))
            })
            .collect();

        let mut fired = 0;
        for (id, tick) in due {
            // An earlier tick in this batch may have stopped it
            if !self.is_timer_active(id) {
                continue;
            }

            // A tick that opened a nested loop is still running; skip it there
            let flow = match tick.try_borrow_mut() {
                Ok(mut tick) => (*tick)(),
                Err(_) => {
                    tracing::trace!("Skipping re-entrant tick of {}", id);
                    continue;
                }
            };
            fired += 1;

            if flow == TimerFlow::Stop {
                self.stop_timer(id);
            }
        }

        fired
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl UiPlatform for EventLoop {
    fn dispatcher(&self) -> Arc<dyn Dispatch> {
        self.dispatcher.clone()
    }

    fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn start_timer(&self, interval: Duration, tick: TimerTick) -> TimerId {
        let id = TimerId(self.next_timer.get());
        self.next_timer.set(id.0 + 1);

        self.timers.borrow_mut().insert(
            id,
            TimerEntry {
                interval,
                due: Instant::now() + interval,
                tick: Rc::new(RefCell::new(tick)),
            },
        );

        tracing::debug!("Started {} with interval {:?}", id, interval);
        id
    }

    fn stop_timer(&self, id: TimerId) {
        if self.timers.borrow_mut().shift_remove(&id).is_some() {
            tracing::debug!("Stopped {}", id);
        }
    }

    fn is_timer_active(&self, id: TimerId) -> bool {
        self.timers.borrow().contains_key(&id)
    }

    fn run_modal(&self, until: &dyn Fn() -> bool) {
        if !self.run_until(until) {
            tracing::warn!("Modal loop abandoned because the event loop is quitting");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_post_from_background_runs_on_owner() {
        let event_loop = EventLoop::new();
        let dispatcher = event_loop.dispatcher_handle();
        let owner = thread::current().id();

        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            assert!(!dispatcher.is_owner_thread());
            dispatcher
                .post(Box::new(move || tx.send(thread::current().id()).unwrap()))
                .unwrap();
        })
        .join()
        .unwrap();

        event_loop.run_pending();
        assert_eq!(rx.try_recv().ok(), Some(owner));
    }

    #[test]
    fn test_jobs_from_one_thread_run_in_order() {
        let event_loop = EventLoop::new();
        let dispatcher = event_loop.dispatcher_handle();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let seen_bg = seen.clone();
        thread::spawn(move || {
            for i in 0..50 {
                let seen = seen_bg.clone();
                dispatcher
                    .post(Box::new(move || seen.lock().unwrap().push(i)))
                    .unwrap();
            }
        })
        .join()
        .unwrap();

        event_loop.run_pending();
        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_quit_from_background_stops_run() {
        let event_loop = EventLoop::new();
        let dispatcher = event_loop.dispatcher_handle();

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            dispatcher.quit().unwrap();
        });

        event_loop.run();
        assert_eq!(event_loop.depth(), 0);
    }

    #[test]
    fn test_timer_ticks_until_stopped() {
        let event_loop = EventLoop::new();
        let ticks = Rc::new(Cell::new(0));

        let ticks_in_timer = ticks.clone();
        let id = event_loop.start_timer(
            Duration::from_millis(5),
            Box::new(move || {
                ticks_in_timer.set(ticks_in_timer.get() + 1);
                if ticks_in_timer.get() == 3 {
                    TimerFlow::Stop
                } else {
                    TimerFlow::Continue
                }
            }),
        );

        let ticks_check = ticks.clone();
        event_loop.run_until(&move || ticks_check.get() >= 3);

        assert_eq!(ticks.get(), 3);
        assert!(!event_loop.is_timer_active(id));
        assert_eq!(event_loop.active_timers(), 0);
    }

    #[test]
    fn test_stop_timer_is_idempotent() {
        let event_loop = EventLoop::new();
        let id = event_loop.start_timer(Duration::from_secs(60), Box::new(|| TimerFlow::Continue));

        event_loop.stop_timer(id);
        event_loop.stop_timer(id);
        assert!(!event_loop.is_timer_active(id));
    }

    #[test]
    fn test_nested_modal_loop_services_jobs() {
        let event_loop = Rc::new(EventLoop::new());
        let dispatcher = event_loop.dispatcher_handle();
        let served = Arc::new(AtomicUsize::new(0));
        let finished = Rc::new(Cell::new(false));

        // Background work posts jobs while the UI thread sits in a nested loop
        let served_bg = served.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            for _ in 0..5 {
                let served = served_bg.clone();
                dispatcher
                    .post(Box::new(move || {
                        served.fetch_add(1, Ordering::SeqCst);
                    }))
                    .unwrap();
            }
        });

        let nested = event_loop.clone();
        let served_nested = served.clone();
        let finished_in_timer = finished.clone();
        event_loop.start_timer(
            Duration::from_millis(1),
            Box::new(move || {
                let served = served_nested.clone();
                nested.run_modal(&move || served.load(Ordering::SeqCst) == 5);
                finished_in_timer.set(true);
                TimerFlow::Stop
            }),
        );

        let finished_check = finished.clone();
        assert!(event_loop.run_until(&move || finished_check.get()));
        assert_eq!(served.load(Ordering::SeqCst), 5);
        assert_eq!(event_loop.depth(), 0);
    }

    #[test]
    fn test_reentrant_tick_is_skipped() {
        let event_loop = Rc::new(EventLoop::new());
        let ticks = Rc::new(Cell::new(0));
        let finished = Rc::new(Cell::new(false));

        let nested = event_loop.clone();
        let ticks_in_timer = ticks.clone();
        let finished_in_timer = finished.clone();
        event_loop.start_timer(
            Duration::from_millis(2),
            Box::new(move || {
                ticks_in_timer.set(ticks_in_timer.get() + 1);
                // Spin a nested loop long enough for this timer to come due again
                nested.run_for(Duration::from_millis(20));
                finished_in_timer.set(true);
                TimerFlow::Stop
            }),
        );

        let finished_check = finished.clone();
        event_loop.run_until(&move || finished_check.get());

        assert_eq!(ticks.get(), 1);
    }

    #[test]
    fn test_post_after_loop_dropped_fails() {
        let dispatcher = {
            let event_loop = EventLoop::new();
            event_loop.dispatcher_handle()
        };

        // The receiver went away with the loop
        let result = dispatcher.post(Box::new(|| {}));
        assert_eq!(result, Err(PlatformError::LoopClosed));
    }
}
