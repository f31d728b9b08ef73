//! Pauses between items

use crate::config::{delay_from_secs, PacingConfig};
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleeps for `duration` unless cancelled first
///
/// Returns `false` if the token fired before the sleep finished.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}

/// Fixed cooldown after every item plus a long pause every `interval` items
#[derive(Debug, Clone)]
pub struct Pacer {
    cooldown: Duration,
    batch_interval: usize,
    batch_min: f64,
    batch_max: f64,
}

impl Pacer {
    pub fn new(config: &PacingConfig) -> Self {
        Self {
            cooldown: config.cooldown(),
            batch_interval: config.batch_pause_interval,
            batch_min: config.batch_pause_min.max(0.0),
            batch_max: config.batch_pause_max.max(config.batch_pause_min.max(0.0)),
        }
    }

    pub fn is_batch_boundary(&self, processed: usize) -> bool {
        self.batch_interval > 0 && processed > 0 && processed % self.batch_interval == 0
    }

    fn batch_pause(&self) -> Duration {
        let secs = if self.batch_max > self.batch_min {
            rand::thread_rng().gen_range(self.batch_min..=self.batch_max)
        } else {
            self.batch_min
        };
        delay_from_secs(secs)
    }

    /// Paces after an item; `processed` counts items handled so far
    pub async fn after_item(&self, processed: usize, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            return;
        }

        if !sleep_or_cancel(self.cooldown, cancel).await {
            return;
        }

        if self.is_batch_boundary(processed) {
            let pause = self.batch_pause();
            tracing::info!(
                "Batch pause ({} processed): {:.0}s...",
                processed,
                pause.as_secs_f64()
            );
            sleep_or_cancel(pause, cancel).await;
        }
    }
}
