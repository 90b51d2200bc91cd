//! Background sample eviction
//!
//! Runs `StatsTracker::sweep` once per tick until shut down. Shutdown is
//! signalled through a watch channel and observed within one tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::debug;

use super::stats::StatsTracker;

/// Periodic sweeper over a stats tracker's windows
pub struct Sweeper {
    stats: Arc<StatsTracker>,
    tick: Duration,
}

impl Sweeper {
    pub fn new(stats: Arc<StatsTracker>, tick: Duration) -> Self {
        Self { stats, tick }
    }

    /// Run the sweep loop (call in a spawned task)
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = interval(self.tick);
        tick.tick().await; // Skip immediate tick

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.stats.sweep();
                }
                changed = shutdown.changed() => {
                    // A closed channel means the handle owner is gone;
                    // treat it the same as an explicit shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("sweeper shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Handle for managing the sweeper lifecycle
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl SweeperHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for SweeperHandle {
    fn default() -> Self {
        Self::new().0
    }
}
