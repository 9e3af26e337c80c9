//! Periodic sweep of expired leases.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;

use super::Scheduler;

/// Background loop that hands expired leases back to the scheduler.
#[derive(Clone)]
pub struct Reaper {
    scheduler: Scheduler,
    interval: Duration,
}

impl Reaper {
    pub fn new(scheduler: Scheduler) -> Self {
        let interval = scheduler.config().reaper_interval();
        Self {
            scheduler,
            interval,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sweeps every `interval` until `shutdown` flips to `true`. Sweep
    /// failures are logged and retried on the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        info!("Reaper sweeping every {}ms", self.interval.as_millis());

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.scheduler.reap().await {
                        Ok(reaped) if reaped.is_empty() => debug!("Reaper found no expired leases"),
                        Ok(reaped) => info!("Reaper reclaimed {} tasks", reaped.len()),
                        Err(e) => warn!("Reaper sweep failed: {e}"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Reaper stopped");
    }
}
