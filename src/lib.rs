//! Subreddit Scanner: a paced, rate-limited subreddit metadata crawler
//!
//! This crate enumerates subreddits from a work list or from its own store,
//! fetches their metadata from the Reddit API under strict outbound rate
//! limits, and persists the results into a local SQLite database.

pub mod client;
pub mod config;
pub mod limiter;
pub mod output;
pub mod scanner;
pub mod state;
pub mod storage;
pub mod worklist;

use thiserror::Error;

/// Main error type for scanner operations
#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("API error: {0}")]
    Api(#[from] client::ApiError),

    #[error("Work list error: {0}")]
    WorkList(#[from] worklist::WorkListError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing required Reddit API credentials: {0}")]
    MissingCredentials(String),
}

/// Result type alias for scanner operations
pub type Result<T> = std::result::Result<T, ScannerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{Classification, ItemStatus};
