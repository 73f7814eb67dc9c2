//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::thread::{self, ThreadId};
use waitrun::models::{CancelFlag, ProgressChange, ProgressState};
use waitrun::platform::UiPlatform;
use waitrun::ui::{TextWaitSurface, WaitSurface};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Shown(ThreadId),
    Hidden(ThreadId),
    Disposed,
}

/// Text surface that records its lifecycle calls and the thread they ran on
pub struct RecordingSurface {
    inner: TextWaitSurface,
    events: RefCell<Vec<SurfaceEvent>>,
    applied: RefCell<Vec<ProgressChange>>,
}

impl RecordingSurface {
    pub fn new(platform: Rc<dyn UiPlatform>) -> Rc<Self> {
        Rc::new(Self {
            inner: TextWaitSurface::new(platform),
            events: RefCell::new(Vec::new()),
            applied: RefCell::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.borrow().clone()
    }

    pub fn applied(&self) -> Vec<ProgressChange> {
        self.applied.borrow().clone()
    }

    pub fn show_count(&self) -> usize {
        self.count(|event| matches!(event, SurfaceEvent::Shown(_)))
    }

    pub fn hide_count(&self) -> usize {
        self.count(|event| matches!(event, SurfaceEvent::Hidden(_)))
    }

    fn count(&self, predicate: impl Fn(&SurfaceEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|event| predicate(event)).count()
    }
}

impl WaitSurface for RecordingSurface {
    fn progress(&self) -> ProgressState {
        self.inner.progress()
    }

    fn apply(&self, change: ProgressChange) {
        self.applied.borrow_mut().push(change.clone());
        self.inner.apply(change);
    }

    fn cancel_flag(&self) -> CancelFlag {
        self.inner.cancel_flag()
    }

    fn show(&self) {
        self.events
            .borrow_mut()
            .push(SurfaceEvent::Shown(thread::current().id()));
        self.inner.show();
    }

    fn hide(&self) {
        // Only real transitions count; the watcher also hides surfaces that
        // were never shown
        if self.inner.is_visible() {
            self.events
                .borrow_mut()
                .push(SurfaceEvent::Hidden(thread::current().id()));
        }
        self.inner.hide();
    }

    fn is_visible(&self) -> bool {
        self.inner.is_visible()
    }

    fn dispose(&self) {
        self.events.borrow_mut().push(SurfaceEvent::Disposed);
        self.inner.dispose();
    }
}
