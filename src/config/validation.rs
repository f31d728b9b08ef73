use crate::config::types::{
    ApiConfig, Config, PacingConfig, RateLimitConfig, SafetyConfig, MAX_DELAY_SECS,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_rate_limits(&config.rate_limit)?;
    validate_pacing(&config.pacing)?;
    validate_safety(&config.safety)?;

    if config.storage.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates endpoint URLs and request settings
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.auth_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid auth_url: {}", e)))?;
    Url::parse(&config.api_base)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api_base: {}", e)))?;

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates window capacities: non-zero and nested smallest to largest
fn validate_rate_limits(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.per_second < 1 || config.per_ten_seconds < 1 || config.per_minute < 1 {
        return Err(ConfigError::Validation(
            "rate limit capacities must all be >= 1".to_string(),
        ));
    }

    if config.per_second > config.per_ten_seconds {
        return Err(ConfigError::Validation(format!(
            "per_second ({}) cannot exceed per_ten_seconds ({})",
            config.per_second, config.per_ten_seconds
        )));
    }

    if config.per_ten_seconds > config.per_minute {
        return Err(ConfigError::Validation(format!(
            "per_ten_seconds ({}) cannot exceed per_minute ({})",
            config.per_ten_seconds, config.per_minute
        )));
    }

    Ok(())
}

/// Validates delay ranges
fn validate_pacing(config: &PacingConfig) -> Result<(), ConfigError> {
    let delays = [
        ("min_request_delay", config.min_request_delay),
        ("max_request_delay", config.max_request_delay),
        ("item_cooldown", config.item_cooldown),
        ("batch_pause_min", config.batch_pause_min),
        ("batch_pause_max", config.batch_pause_max),
    ];

    for (name, value) in delays {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::Validation(format!(
                "{} must be a non-negative number of seconds, got {}",
                name, value
            )));
        }
        if value > MAX_DELAY_SECS {
            return Err(ConfigError::Validation(format!(
                "{} must be at most {} seconds, got {}",
                name, MAX_DELAY_SECS, value
            )));
        }
    }

    if config.min_request_delay > config.max_request_delay {
        return Err(ConfigError::Validation(format!(
            "min_request_delay ({}) cannot exceed max_request_delay ({})",
            config.min_request_delay, config.max_request_delay
        )));
    }

    if config.batch_pause_min > config.batch_pause_max {
        return Err(ConfigError::Validation(format!(
            "batch_pause_min ({}) cannot exceed batch_pause_max ({})",
            config.batch_pause_min, config.batch_pause_max
        )));
    }

    if config.batch_pause_interval < 1 {
        return Err(ConfigError::Validation(
            "batch_pause_interval must be >= 1".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&config.diversity_probability) {
        return Err(ConfigError::Validation(format!(
            "diversity_probability must be within [0, 1], got {}",
            config.diversity_probability
        )));
    }

    Ok(())
}

fn validate_safety(config: &SafetyConfig) -> Result<(), ConfigError> {
    if config.max_consecutive_forbidden < 1 || config.max_total_rate_limited < 1 {
        return Err(ConfigError::Validation(
            "auto-termination thresholds must be >= 1".to_string(),
        ));
    }

    if config.forbidden_retry_budget < 1 {
        return Err(ConfigError::Validation(
            "forbidden_retry_budget must be >= 1".to_string(),
        ));
    }

    Ok(())
}
