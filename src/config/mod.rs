//! Configuration module for the scanner
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file, reading API credentials from the environment, and
//! layering command-line overrides on top.
//!
//! # Example
//!
//! ```no_run
//! use subreddit_scanner::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scanner.toml")).unwrap();
//! println!("Cooldown between items: {}s", config.pacing.item_cooldown);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    delay_from_secs, ApiConfig, Config, Credentials, Overrides, PacingConfig, RateLimitConfig, SafetyConfig,
    StorageConfig, WorkListConfig, MAX_DELAY_SECS,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, credentials_from, load_config, load_config_with_hash, load_credentials,
};
pub use validation::validate;
