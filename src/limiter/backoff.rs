//! Exponential backoff with jitter
//!
//! A [`Backoff`] belongs to one logical retry sequence. Create a fresh one
//! per outbound call; never share it between unrelated operations.

use rand::Rng;
use std::time::Duration;

/// Backoff tuning
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub base: Duration,
    pub multiplier: f64,
    pub cap: Duration,
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            multiplier: 2.0,
            cap: Duration::from_secs(60),
            jitter: true,
        }
    }
}

/// Jitter bounds applied multiplicatively to the capped delay
pub const JITTER_LOW: f64 = 0.75;
pub const JITTER_HIGH: f64 = 1.25;

/// Stateful exponential delay generator
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay for the current attempt before jitter: `min(base * multiplier^attempt, cap)`
    pub fn base_delay(&self) -> Duration {
        let exponent = i32::try_from(self.attempt).unwrap_or(i32::MAX);
        let raw = self.config.base.as_secs_f64() * self.config.multiplier.powi(exponent);
        let capped = raw.min(self.config.cap.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.config.cap
        }
    }

    /// Delay for the current attempt, jittered when enabled
    pub fn next_delay(&self) -> Duration {
        let delay = self.base_delay();
        if self.config.jitter {
            let factor = rand::thread_rng().gen_range(JITTER_LOW..=JITTER_HIGH);
            delay.mul_f64(factor)
        } else {
            delay
        }
    }

    /// Sleeps for the current delay, then advances to the next attempt
    pub async fn wait(&mut self) {
        let delay = self.next_delay();
        tracing::debug!(
            "Exponential backoff: waiting {:.2?} (attempt {})",
            delay,
            self.attempt
        );
        tokio::time::sleep(delay).await;
        self.attempt = self.attempt.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> BackoffConfig {
        BackoffConfig {
            jitter: false,
            ..BackoffConfig::default()
        }
    }

    #[test]
    fn test_base_delay_doubles_until_cap() {
        let mut backoff = Backoff::new(no_jitter());
        let expected = [1, 2, 4, 8, 16, 32, 60, 60, 60];

        for secs in expected {
            assert_eq!(backoff.next_delay(), Duration::from_secs(secs));
            backoff.attempt += 1;
        }
    }

    #[test]
    fn test_jittered_delay_never_exceeds_cap_bound() {
        let config = BackoffConfig::default();
        let ceiling = config.cap.mul_f64(JITTER_HIGH);
        let mut backoff = Backoff::new(config);

        for attempt in 0..40 {
            backoff.attempt = attempt;
            for _ in 0..50 {
                let delay = backoff.next_delay();
                assert!(delay <= ceiling, "{:?} > {:?}", delay, ceiling);
                assert!(delay >= backoff.base_delay().mul_f64(JITTER_LOW));
            }
        }
    }

    #[test]
    fn test_mean_delay_is_non_decreasing() {
        let mut backoff = Backoff::default();
        let mut previous = Duration::ZERO;

        for attempt in 0..10 {
            backoff.attempt = attempt;
            let samples = 400u32;
            let total: Duration = (0..samples).map(|_| backoff.next_delay()).sum();
            let mean = total / samples;

            // Tolerate sampling noise once both sides sit at the cap
            let slack = previous.mul_f64(0.05);
            assert!(mean + slack >= previous, "attempt {}: {:?} < {:?}", attempt, mean, previous);
            previous = mean;
        }
    }

    #[test]
    fn test_huge_attempt_saturates_at_cap() {
        let mut backoff = Backoff::new(no_jitter());
        backoff.attempt = u32::MAX;
        assert_eq!(backoff.next_delay(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_advances_and_reset_restarts() {
        let mut backoff = Backoff::new(no_jitter());
        let start = tokio::time::Instant::now();

        backoff.wait().await;
        backoff.wait().await;
        assert_eq!(backoff.attempt(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(3));

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }
}
