// UiBound - cross-thread token for a value that lives on the UI thread
//
// The value itself sits in a thread-local slot table on the thread that
// registered it. The token only carries the slot number and the owner thread
// id, so it is Send + Sync and can ride along inside jobs posted from
// background threads. Resolving it anywhere but the owner thread yields None.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

static NEXT_SLOT: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static SLOTS: RefCell<HashMap<u64, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

/// Send + Sync handle to a UI-thread-only value
///
/// The registered value stays alive until [`release`](Self::release) is
/// called on the owner thread (or the owner thread exits).
pub struct UiBound<T: ?Sized + 'static> {
    slot: u64,
    owner: ThreadId,
    _marker: PhantomData<fn() -> Rc<T>>,
}

impl<T: ?Sized + 'static> UiBound<T> {
    /// Register `value` on the current thread, which becomes its owner
    pub fn new(value: Rc<T>) -> Self {
        let slot = NEXT_SLOT.fetch_add(1, Ordering::Relaxed);
        SLOTS.with(|slots| {
            slots.borrow_mut().insert(slot, Box::new(value));
        });

        Self {
            slot,
            owner: thread::current().id(),
            _marker: PhantomData,
        }
    }

    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Resolve the value. `None` off the owner thread or after release.
    pub fn get(&self) -> Option<Rc<T>> {
        if !self.is_owner_thread() {
            return None;
        }

        // Clone the Rc out so no slot-table borrow is held while the caller
        // runs; the value may re-enter the table (e.g. through a nested loop).
        SLOTS.with(|slots| {
            slots
                .borrow()
                .get(&self.slot)
                .and_then(|entry| entry.downcast_ref::<Rc<T>>())
                .cloned()
        })
    }

    /// Run `f` against the value if it can be resolved here
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.get().map(|value| f(&value))
    }

    pub fn is_alive(&self) -> bool {
        self.get().is_some()
    }

    /// Remove the value from the slot table, returning it.
    ///
    /// Every clone of this token stops resolving afterwards.
    pub fn release(&self) -> Option<Rc<T>> {
        if !self.is_owner_thread() {
            return None;
        }

        SLOTS
            .with(|slots| slots.borrow_mut().remove(&self.slot))
            .and_then(|entry| entry.downcast::<Rc<T>>().ok())
            .map(|boxed| *boxed)
    }
}

// Manual Clone implementation to avoid requiring T: Clone
impl<T: ?Sized + 'static> Clone for UiBound<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot,
            owner: self.owner,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + 'static> fmt::Debug for UiBound<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiBound")
            .field("slot", &self.slot)
            .field("owner", &self.owner)
            .finish()
    }
}
