//! Sliding-window bookkeeping and the async rate limiter built on it
//!
//! [`SlidingWindows`] is the clock-free core: callers hand it the current
//! instant, so tests can drive it with synthetic time. [`RateLimiter`]
//! wraps it in a mutex and turns its answers into sleeps.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Capacities of the three nested windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimits {
    pub per_second: usize,
    pub per_ten_seconds: usize,
    pub per_minute: usize,
}

impl Default for WindowLimits {
    fn default() -> Self {
        Self {
            per_second: 2,
            per_ten_seconds: 12,
            per_minute: 60,
        }
    }
}

impl From<&crate::config::RateLimitConfig> for WindowLimits {
    fn from(config: &crate::config::RateLimitConfig) -> Self {
        Self {
            per_second: config.per_second,
            per_ten_seconds: config.per_ten_seconds,
            per_minute: config.per_minute,
        }
    }
}

/// A single FIFO of grant timestamps bounded to a trailing horizon
#[derive(Debug)]
struct Window {
    horizon: Duration,
    capacity: usize,
    stamps: VecDeque<Instant>,
}

impl Window {
    fn new(horizon: Duration, capacity: usize) -> Self {
        Self {
            horizon,
            capacity,
            stamps: VecDeque::with_capacity(capacity),
        }
    }

    /// Drops every stamp that is at least `horizon` old
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.stamps.front() {
            if now.saturating_duration_since(*oldest) >= self.horizon {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time until the oldest stamp expires, if the window is full
    fn wait_for_room(&self, now: Instant) -> Option<Duration> {
        if self.stamps.len() < self.capacity {
            return None;
        }
        self.stamps
            .front()
            .map(|oldest| self.horizon.saturating_sub(now.saturating_duration_since(*oldest)))
    }
}

/// Three independent sliding windows (1 s, 10 s, 60 s)
#[derive(Debug)]
pub struct SlidingWindows {
    windows: [Window; 3],
}

impl SlidingWindows {
    pub fn new(limits: WindowLimits) -> Self {
        Self {
            windows: [
                Window::new(Duration::from_secs(1), limits.per_second),
                Window::new(Duration::from_secs(10), limits.per_ten_seconds),
                Window::new(Duration::from_secs(60), limits.per_minute),
            ],
        }
    }

    /// Prunes all windows and returns how long the caller must wait
    ///
    /// Zero means every window has room right now. Otherwise the result is
    /// the largest time-until-expiry over the saturated windows.
    pub fn required_wait(&mut self, now: Instant) -> Duration {
        self.windows
            .iter_mut()
            .filter_map(|window| {
                window.prune(now);
                window.wait_for_room(now)
            })
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Records a grant at `now` in all three windows
    pub fn record(&mut self, now: Instant) {
        for window in &mut self.windows {
            window.stamps.push_back(now);
        }
    }

    /// Current entry counts, smallest window first
    pub fn counts(&self) -> [usize; 3] {
        [
            self.windows[0].stamps.len(),
            self.windows[1].stamps.len(),
            self.windows[2].stamps.len(),
        ]
    }

    pub fn clear(&mut self) {
        for window in &mut self.windows {
            window.stamps.clear();
        }
    }
}

/// Result of a bounded acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Granted,
    TimedOut,
}

/// Cumulative limiter counters
#[derive(Debug, Clone, Default)]
pub struct LimiterStats {
    pub total_granted: u64,
    pub total_blocked: u64,
    pub average_wait: Duration,
    /// Entries currently held in the 1 s, 10 s and 60 s windows
    pub current: [usize; 3],
}

#[derive(Debug)]
struct LimiterState {
    windows: SlidingWindows,
    total_granted: u64,
    total_blocked: u64,
    total_wait: Duration,
}

/// Multi-window sliding rate limiter
///
/// Check-and-record happens under one async mutex that stays held while a
/// caller sleeps for window clearance, so two callers can never both see
/// room and both record.
#[derive(Debug)]
pub struct RateLimiter {
    limits: WindowLimits,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(limits: WindowLimits) -> Self {
        tracing::debug!(
            "Rate limiter initialized: {}/s, {}/10s, {}/min",
            limits.per_second,
            limits.per_ten_seconds,
            limits.per_minute
        );

        Self {
            limits,
            state: Mutex::new(LimiterState {
                windows: SlidingWindows::new(limits),
                total_granted: 0,
                total_blocked: 0,
                total_wait: Duration::ZERO,
            }),
        }
    }

    pub fn limits(&self) -> WindowLimits {
        self.limits
    }

    /// Waits as long as needed for a request slot
    pub async fn acquire(&self) {
        self.acquire_within(None).await;
    }

    /// Waits for a request slot, giving up if the wait would exceed `timeout`
    pub async fn acquire_timeout(&self, timeout: Duration) -> Acquire {
        self.acquire_within(Some(timeout)).await
    }

    async fn acquire_within(&self, timeout: Option<Duration>) -> Acquire {
        let start = Instant::now();
        let mut state = self.state.lock().await;

        loop {
            let now = Instant::now();
            let wait = state.windows.required_wait(now);

            if wait.is_zero() {
                state.windows.record(now);
                state.total_granted += 1;
                state.total_wait += now.saturating_duration_since(start);
                return Acquire::Granted;
            }

            state.total_blocked += 1;

            if let Some(limit) = timeout {
                if now.saturating_duration_since(start) + wait > limit {
                    tracing::debug!("Rate limit: would wait {:.2?}, timing out", wait);
                    return Acquire::TimedOut;
                }
            }

            tracing::debug!("Rate limit: waiting {:.2?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    pub async fn stats(&self) -> LimiterStats {
        let state = self.state.lock().await;
        let average_wait = if state.total_granted > 0 {
            state.total_wait / state.total_granted as u32
        } else {
            Duration::ZERO
        };

        LimiterStats {
            total_granted: state.total_granted,
            total_blocked: state.total_blocked,
            average_wait,
            current: state.windows.counts(),
        }
    }

    /// Clears all windows and counters
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.windows.clear();
        state.total_granted = 0;
        state.total_blocked = 0;
        state.total_wait = Duration::ZERO;
    }
}
