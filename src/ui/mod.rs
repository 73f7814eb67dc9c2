// UI module - everything that runs on, or talks to, the UI thread
//
// This module contains:
// - Marshaller: runs calls against a UI-thread value from any thread
// - WaitSurface / TextWaitSurface: the modal "please wait" surface
// - ProgressReporter: thread-safe progress handle handed to task bodies
// - CompletionWatcher: UI timer that hides the surface once the runner is idle
// - Coordinator: wires the above to a TaskRunner and owns the start protocol

pub mod coordinator;
pub mod marshal;
pub mod reporter;
pub mod surface;
pub mod watcher;

pub use coordinator::{Coordinator, CoordinatorBuilder, CoordinatorError};
pub use marshal::{MarshalError, Marshaller};
pub use reporter::ProgressReporter;
pub use surface::{TextWaitSurface, WaitSurface};
pub use watcher::CompletionWatcher;
