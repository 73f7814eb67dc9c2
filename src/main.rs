//! WaitRun demo - a simulated file copy behind the text wait surface
//!
//! # Overview
//!
//! This binary wires every piece of the library together:
//! - Configuration loading ([`ConfigManager`], `WaitRun Data/WaitRun.yaml`)
//! - Logging infrastructure (file rotation + console output)
//! - Tokio runtime whose blocking pool runs the task body
//! - [`EventLoop`] on the main thread as the UI thread
//! - [`Coordinator`] with a [`TextWaitSurface`]
//!
//! # Execution Flow
//!
//! 1. Load configuration (writing the defaults on first run)
//! 2. Initialize logging → logs/waitrun.<date>
//! 3. Create the tokio runtime and the UI event loop
//! 4. Start the copy job; the wait surface appears after the grace period
//! 5. Ctrl-C presses the surface's cancel control
//! 6. Log the coordination metrics and shut the runtime down

use anyhow::Result;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use waitrun::services::{BackgroundRunner, TaskOutcome, WorkContext, WorkError};
use waitrun::ui::{Coordinator, TextWaitSurface, WaitSurface};
use waitrun::{APP_NAME, BarStyle, ConfigManager, EventLoop, VERSION};

/// Number of files the demo job pretends to copy
const DEMO_FILE_COUNT: u32 = 25;

/// Simulated time per file
const DEMO_FILE_DELAY: Duration = Duration::from_millis(120);

fn main() -> Result<()> {
    let config_manager = ConfigManager::new("WaitRun Data")?;
    let config = config_manager.load()?;
    if !config_manager.config_path().exists() {
        config_manager.save(&config)?;
    }

    let _log_guard = waitrun::logging::setup_logging(&config.logging)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("waitrun-worker")
        .build()?;

    // The main thread is the UI thread from here on
    let event_loop = Rc::new(EventLoop::new());
    let surface = Rc::new(TextWaitSurface::new(event_loop.clone()));

    let cancel = surface.cancel_flag();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, requesting cancellation");
            cancel.request();
        }
    });

    let runner = BackgroundRunner::builder(runtime.handle().clone(), copy_files)
        .supports_cancellation(true)
        .on_completed(|outcome| match outcome {
            TaskOutcome::Completed(count) => tracing::info!("Copied {} files", count),
            TaskOutcome::Cancelled => tracing::warn!("Copy cancelled"),
            TaskOutcome::Failed(err) => tracing::error!("Copy failed: {:#}", err),
        })
        .build();

    let coordinator = Coordinator::builder(event_loop.clone(), Arc::new(runner))
        .surface(surface)
        .config(config.coordinator.clone())
        .build()?;

    coordinator.set_message("Preparing copy");
    coordinator.set_bar_style(BarStyle::Determinate);

    coordinator.start(Some(DEMO_FILE_COUNT))?;

    // Apply progress writes queued after the surface closed
    event_loop.run_pending();

    coordinator.metrics().log_summary();
    coordinator.dispose();

    runtime.shutdown_timeout(Duration::from_secs(5));

    tracing::info!("Application shutdown complete");
    Ok(())
}

fn copy_files(ctx: WorkContext<u32>) -> Result<u32, WorkError> {
    let total = ctx.argument().copied().unwrap_or(DEMO_FILE_COUNT);
    let reporter = ctx.reporter();

    reporter.set_bar_minimum(0);
    reporter.set_bar_maximum(i32::try_from(total).unwrap_or(i32::MAX));
    reporter.set_bar_step(1);

    for index in 1..=total {
        ctx.check_cancelled()?;
        reporter.set_message(format!("Copying file {} of {}", index, total));
        std::thread::sleep(DEMO_FILE_DELAY);
        reporter.perform_step();
    }

    reporter.set_message("Copy complete");
    Ok(total)
}
