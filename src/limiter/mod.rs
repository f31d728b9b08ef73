//! Outbound request throttling
//!
//! This module contains the two pacing primitives every API call goes through:
//! - `RateLimiter`: three nested sliding windows (per second, per 10 seconds,
//!   per minute) behind a single async gate
//! - `Backoff`: exponential delay with jitter for transient failures

mod backoff;
mod window;

pub use backoff::{Backoff, BackoffConfig, JITTER_HIGH, JITTER_LOW};
pub use window::{Acquire, LimiterStats, RateLimiter, SlidingWindows, WindowLimits};
