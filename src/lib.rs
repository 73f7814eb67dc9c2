// WaitRun - run a task off the UI thread behind a modal "please wait" surface
//
// This is the library crate containing the coordination logic.
// The binary crate (main.rs) runs a simulated job under the text surface.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod platform;
pub mod services;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::CoordinatorMetrics;
pub use models::{BarStyle, CancelFlag, CancellationFlags, ProgressChange, ProgressState, WaitRunConfig};
pub use platform::{EventLoop, UiPlatform};
pub use services::{BackgroundRunner, TaskOutcome, TaskRunner, WorkContext, WorkError};
pub use ui::{Coordinator, CoordinatorError, ProgressReporter, TextWaitSurface, WaitSurface};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
