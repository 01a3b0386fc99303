//! Cancellable periodic task.
//!
//! Runs a callback on a fixed interval until either the task's own stop
//! token or an external shutdown token fires. On cancellation the callback
//! runs one last time before the task exits, so whatever it cleans up is
//! always cleaned up on the way out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct PeriodicTask {
    name: &'static str,
    period: Duration,
    stop: CancellationToken,
    spawned: AtomicBool,
}

impl PeriodicTask {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self { name, period, stop: CancellationToken::new(), spawned: AtomicBool::new(false) }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawn the task on the current runtime.
    ///
    /// Returns `None` if the task was already spawned or stopped. The first
    /// tick fires one full period after spawning.
    pub fn spawn<F>(&self, shutdown: CancellationToken, mut tick: F) -> Option<JoinHandle<()>>
    where
        F: FnMut() + Send + 'static,
    {
        if self.stop.is_cancelled() || self.spawned.swap(true, Ordering::SeqCst) {
            return None;
        }

        let name = self.name;
        let period = self.period;
        let stop = self.stop.clone();

        Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        debug!(task = name, "Periodic task tick");
                        tick();
                    }
                    _ = stop.cancelled() => {
                        debug!(task = name, "Periodic task stopped");
                        tick();
                        break;
                    }
                    _ = shutdown.cancelled() => {
                        debug!(task = name, "Periodic task cancelled by shutdown");
                        tick();
                        break;
                    }
                }
            }
        }))
    }

    /// Stop the task. Safe to call more than once.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}
