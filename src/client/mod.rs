//! Client module for the Reddit API
//!
//! # Components
//!
//! - `ApiClient`: paced, rate-limited, authenticated request dispatch
//! - `TokenSession`: password-grant token with early refresh
//! - `SubredditInfo` / `FetchOutcome`: typed `about` payloads and their classification

mod api;
mod info;
mod session;

pub use api::{
    build_http_client, parse_retry_after, ApiClient, Response, COVER_ENDPOINTS,
    DEFAULT_RETRY_AFTER, MAX_FREE_RETRIES,
};
pub use info::{decode_html_entities, FetchOutcome, SubredditInfo};
pub use session::{authenticate, TokenSession, REFRESH_MARGIN};

use thiserror::Error;

/// Errors surfaced by API requests
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error {0}")]
    Http(u16),

    #[error("Gave up after {retries} consecutive 401/429 responses")]
    Throttled { retries: u32 },

    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Request counters for the current process
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientStats {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub rate_limit_hits: u64,
    pub diversity_requests: u64,
}

impl ClientStats {
    /// Percentage of requests that did not fail
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        let ok = self.total_requests.saturating_sub(self.failed_requests);
        ok as f64 / self.total_requests as f64 * 100.0
    }
}
