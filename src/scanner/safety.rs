//! Auto-termination thresholds

use crate::config::SafetyConfig;
use crate::state::CounterEffect;
use std::fmt;

/// Why a run stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// Too many 403 responses in a row
    ConsecutiveForbidden(u32),
    /// Too many 429 responses since startup
    RateLimited(u64),
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::ConsecutiveForbidden(n) => {
                write!(f, "{} consecutive 403s - likely blocked", n)
            }
            HaltReason::RateLimited(n) => write!(f, "{} rate limit hits (429s)", n),
        }
    }
}

/// Tracks the consecutive-forbidden counter and trips on either threshold
#[derive(Debug, Clone)]
pub struct SafetyValve {
    consecutive_forbidden: u32,
    max_consecutive_forbidden: u32,
    max_total_rate_limited: u64,
}

impl SafetyValve {
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            consecutive_forbidden: 0,
            max_consecutive_forbidden: config.max_consecutive_forbidden,
            max_total_rate_limited: config.max_total_rate_limited,
        }
    }

    pub fn consecutive_forbidden(&self) -> u32 {
        self.consecutive_forbidden
    }

    pub fn apply(&mut self, effect: CounterEffect) {
        match effect {
            CounterEffect::Reset => self.consecutive_forbidden = 0,
            CounterEffect::Increment => {
                self.consecutive_forbidden = self.consecutive_forbidden.saturating_add(1)
            }
        }
    }

    /// Returns the reason to halt, if any threshold is reached
    pub fn check(&self, rate_limit_hits: u64) -> Option<HaltReason> {
        if self.consecutive_forbidden >= self.max_consecutive_forbidden {
            return Some(HaltReason::ConsecutiveForbidden(self.consecutive_forbidden));
        }
        if rate_limit_hits >= self.max_total_rate_limited {
            return Some(HaltReason::RateLimited(rate_limit_hits));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valve() -> SafetyValve {
        SafetyValve::new(&SafetyConfig {
            max_consecutive_forbidden: 3,
            max_total_rate_limited: 2,
            forbidden_retry_budget: 3,
        })
    }

    #[test]
    fn test_consecutive_forbidden_trips() {
        let mut valve = valve();
        valve.apply(CounterEffect::Increment);
        valve.apply(CounterEffect::Increment);
        assert_eq!(valve.check(0), None);

        valve.apply(CounterEffect::Increment);
        assert_eq!(valve.check(0), Some(HaltReason::ConsecutiveForbidden(3)));
    }

    #[test]
    fn test_reset_clears_streak() {
        let mut valve = valve();
        valve.apply(CounterEffect::Increment);
        valve.apply(CounterEffect::Increment);
        valve.apply(CounterEffect::Reset);
        valve.apply(CounterEffect::Increment);

        assert_eq!(valve.consecutive_forbidden(), 1);
        assert_eq!(valve.check(0), None);
    }

    #[test]
    fn test_rate_limit_hits_trip() {
        let valve = valve();
        assert_eq!(valve.check(1), None);
        assert_eq!(valve.check(2), Some(HaltReason::RateLimited(2)));
    }
}
