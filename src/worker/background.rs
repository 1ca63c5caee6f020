//! Background scheduler: periodic integration trigger.
//!
//! Runs the first cycle immediately, then one cycle per configured interval
//! on a dedicated thread. Each cycle is driven to completion on the tokio
//! runtime before the next wait starts, so cycles never overlap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use super::runner::IntegrationWorker;

/// Sleep granularity for shutdown responsiveness.
const SLEEP_GRANULARITY: Duration = Duration::from_millis(500);

/// Handle for the scheduler thread.
///
/// Supports graceful shutdown via `shutdown()` or automatic cleanup on `Drop`.
pub struct SchedulerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Request graceful shutdown. A running cycle completes, no new cycle starts.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Start the scheduler thread. Cycles run on `runtime`.
pub fn start_scheduler(worker: Arc<IntegrationWorker>, runtime: Handle) -> SchedulerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();

    let handle = std::thread::spawn(move || {
        let interval = worker.config().interval;
        tracing::info!(interval_secs = interval.as_secs(), "Integration scheduler started");
        scheduler_loop(&worker, &runtime, interval, &flag);
    });

    SchedulerHandle {
        shutdown,
        handle: Some(handle),
    }
}

fn scheduler_loop(
    worker: &IntegrationWorker,
    runtime: &Handle,
    interval: Duration,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) {
        runtime.block_on(worker.run_cycle());

        if !sleep_unless_shutdown(interval, shutdown) {
            break;
        }
    }
    tracing::info!("Integration scheduler shutting down");
}

/// Sleep for `total` in small steps. Returns false if shutdown was requested.
fn sleep_unless_shutdown(total: Duration, shutdown: &AtomicBool) -> bool {
    let mut waited = Duration::ZERO;
    while waited < total {
        if shutdown.load(Ordering::Relaxed) {
            return false;
        }
        let step = SLEEP_GRANULARITY.min(total - waited);
        std::thread::sleep(step);
        waited += step;
    }
    !shutdown.load(Ordering::Relaxed)
}
