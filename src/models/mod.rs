//! Data models for WaitRun.
//!
//! This module contains the plain data exchanged between the coordinator,
//! the wait surface and the task body:
//! - [`ProgressState`]: What the wait surface displays (message, bar, cancel control)
//! - [`ProgressChange`]: One marshalled write to that state
//! - [`CancellationFlags`] / [`CancelFlag`]: The runner-level and user-level cancel sources
//! - [`WaitRunConfig`]: Timing and logging settings loaded from `WaitRun.yaml`
//!
//! # Architecture Note
//!
//! The models carry no threading policy of their own. `ProgressState` is only ever
//! mutated on the UI thread by a [`WaitSurface`](crate::ui::WaitSurface); the only
//! model meant to be shared across threads is [`CancelFlag`].

pub mod cancel;
pub mod config;
pub mod progress;

pub use cancel::{CancelFlag, CancellationFlags};
pub use config::{CoordinatorConfig, LoggingConfig, WaitRunConfig};
pub use progress::{BarStyle, ProgressChange, ProgressState};
