// Idempotency Sweeper
// Periodic eviction of expired idempotency records; reads already ignore them

use crate::application::shutdown::ShutdownToken;
use crate::error::Result;
use crate::port::IdempotencyStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Idempotency sweeper
///
/// Runs `evict_expired` every `interval` in the background
pub struct IdempotencySweeper {
    store: Arc<dyn IdempotencyStore>,
    interval: Duration,
}

impl IdempotencySweeper {
    /// Create a new sweeper
    ///
    /// # Arguments
    /// * `store` - Idempotency store to sweep
    /// * `interval` - How often to sweep
    pub fn new(store: Arc<dyn IdempotencyStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Sweep loop (background task), ends when `shutdown` fires
    ///
    /// Should be spawned in tokio::spawn
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Idempotency sweeper started"
        );

        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.store.evict_expired().await {
                        Ok(0) => debug!("No expired idempotency records"),
                        Ok(evicted) => info!(evicted, "Evicted expired idempotency records"),
                        Err(e) => error!(error = %e, "Idempotency sweep failed"),
                    }
                }
                _ = shutdown.wait() => {
                    info!("Idempotency sweeper stopped");
                    break;
                }
            }
        }
    }

    /// Sweep immediately (manual trigger)
    pub async fn run_now(&self) -> Result<u64> {
        let evicted = self.store.evict_expired().await?;
        info!(evicted, "Manual idempotency sweep completed");
        Ok(evicted)
    }
}
