//! # Sync Scheduler
//!
//! Periodic trigger for automatic sync passes. The callback decides what a
//! tick does; the engine passes one that respects the single-pass guard and
//! the offline check.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Fixed-interval sync trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncScheduler {
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self::new(Duration::from_secs(seconds))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the tick loop
    ///
    /// The first tick fires one interval after spawning. A slow tick delays
    /// the next one instead of causing a burst.
    pub fn spawn<F, Fut>(&self, mut tick: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                tracing::debug!("Periodic sync tick");
                tick().await;
            }
        })
    }
}
