//! Fixed-period poll timer with idempotent start/stop.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Runs one tick callback every `period`. At most one timer task is live.
#[derive(Debug)]
pub struct PollScheduler {
    period: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PollScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start the timer. The first tick fires one period from now; ticks do
    /// not overlap. Returns `false` when a timer is already running.
    pub fn start<F, Fut>(&self, tick: F) -> bool
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let mut handle = match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        let period = self.period;
        *handle = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(period_ms = period.as_millis() as u64, "Poll scheduler started");

            loop {
                ticker.tick().await;
                // The callback returns false once its target is gone
                if !tick().await {
                    debug!("Poll target dropped, scheduler exiting");
                    break;
                }
            }
        }));
        true
    }

    /// Cancel the timer. Returns `false` when nothing was running.
    pub fn stop(&self) -> bool {
        let mut handle = match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match handle.take() {
            Some(task) => {
                let was_running = !task.is_finished();
                task.abort();
                if was_running {
                    debug!("Poll scheduler stopped");
                }
                was_running
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .map(|handle| handle.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
