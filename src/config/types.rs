use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Main configuration structure for the scanner
///
/// Every section is optional in the TOML file; missing sections and keys
/// fall back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,
    pub pacing: PacingConfig,
    pub safety: SafetyConfig,
    pub storage: StorageConfig,
    #[serde(rename = "work-list")]
    pub work_list: WorkListConfig,
}

/// Upstream API endpoints and request behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// User agent sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Token endpoint for the password grant
    #[serde(rename = "auth-url")]
    pub auth_url: String,

    /// Base URL for authenticated API calls
    #[serde(rename = "api-base")]
    pub api_base: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Attempts per request on server or transport failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            user_agent: "rust:subreddit-scanner:v1.0.0 (Subreddit Discovery Tool)".to_string(),
            auth_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            api_base: "https://oauth.reddit.com".to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// Capacities of the three sliding windows
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    #[serde(rename = "per-second")]
    pub per_second: usize,

    #[serde(rename = "per-ten-seconds")]
    pub per_ten_seconds: usize,

    #[serde(rename = "per-minute")]
    pub per_minute: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 2,
            per_ten_seconds: 12,
            per_minute: 60,
        }
    }
}

/// Human-like pacing between requests and between items
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Lower bound of the random delay before every request (seconds)
    #[serde(rename = "min-request-delay")]
    pub min_request_delay: f64,

    /// Upper bound of the random delay before every request (seconds)
    #[serde(rename = "max-request-delay")]
    pub max_request_delay: f64,

    /// Fixed sleep after every item (seconds)
    #[serde(rename = "item-cooldown")]
    pub item_cooldown: f64,

    /// Take a long pause every this many items
    #[serde(rename = "batch-pause-interval")]
    pub batch_pause_interval: usize,

    #[serde(rename = "batch-pause-min")]
    pub batch_pause_min: f64,

    #[serde(rename = "batch-pause-max")]
    pub batch_pause_max: f64,

    /// Mix unrelated listing requests into the traffic
    #[serde(rename = "request-diversity")]
    pub request_diversity: bool,

    /// Chance of a cover request before each metadata fetch
    #[serde(rename = "diversity-probability")]
    pub diversity_probability: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_request_delay: 1.5,
            max_request_delay: 3.0,
            item_cooldown: 2.0,
            batch_pause_interval: 100,
            batch_pause_min: 20.0,
            batch_pause_max: 40.0,
            request_diversity: true,
            diversity_probability: 0.2,
        }
    }
}

/// Longest configurable delay (seconds)
pub const MAX_DELAY_SECS: f64 = 86_400.0;

/// Converts a delay in seconds, clamped to `[0, MAX_DELAY_SECS]`
pub fn delay_from_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_DELAY_SECS)).unwrap_or_default()
}

impl PacingConfig {
    pub fn cooldown(&self) -> Duration {
        delay_from_secs(self.item_cooldown)
    }
}

/// Auto-termination thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Halt after this many 403 responses in a row
    #[serde(rename = "max-consecutive-forbidden")]
    pub max_consecutive_forbidden: u32,

    /// Halt once this many 429 responses were seen since startup
    #[serde(rename = "max-total-rate-limited")]
    pub max_total_rate_limited: u64,

    /// Number of 403 outcomes after which an item is purged
    #[serde(rename = "forbidden-retry-budget")]
    pub forbidden_retry_budget: u32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_consecutive_forbidden: 10,
            max_total_rate_limited: 3,
            forbidden_retry_budget: 3,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Items refreshed longer ago than this are due again
    #[serde(rename = "stale-days")]
    pub stale_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "subreddit_scanner.db".to_string(),
            stale_days: 30,
        }
    }
}

/// External work list configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkListConfig {
    /// Path to the CSV work list
    pub path: String,

    /// Active items below this subscriber count are dropped in list scans
    #[serde(rename = "min-popularity")]
    pub min_popularity: u64,

    /// Process the most popular rows first
    #[serde(rename = "sort-by-popularity")]
    pub sort_by_popularity: bool,
}

impl Default for WorkListConfig {
    fn default() -> Self {
        Self {
            path: "subreddits_to_scan.csv".to_string(),
            min_popularity: 100,
            sort_by_popularity: true,
        }
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_path: Option<String>,
    pub list_path: Option<String>,
    pub rate_limit_per_minute: Option<usize>,
    pub cooldown_secs: Option<f64>,
}

impl Config {
    /// Applies command-line overrides on top of file values
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(path) = &overrides.database_path {
            tracing::debug!("Config override: database-path = {}", path);
            self.storage.database_path = path.clone();
        }
        if let Some(path) = &overrides.list_path {
            tracing::debug!("Config override: work-list.path = {}", path);
            self.work_list.path = path.clone();
        }
        if let Some(per_minute) = overrides.rate_limit_per_minute {
            tracing::debug!("Config override: per-minute = {}", per_minute);
            self.rate_limit.per_minute = per_minute;
            // Inner windows may not exceed the outer one
            self.rate_limit.per_ten_seconds = self.rate_limit.per_ten_seconds.min(per_minute);
            self.rate_limit.per_second = self
                .rate_limit
                .per_second
                .min(self.rate_limit.per_ten_seconds);
        }
        if let Some(cooldown) = overrides.cooldown_secs {
            tracing::debug!("Config override: item-cooldown = {}", cooldown);
            self.pacing.item_cooldown = cooldown;
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Config(")?;
        writeln!(f, "  user_agent={}", self.api.user_agent)?;
        writeln!(f, "  database={}", self.storage.database_path)?;
        writeln!(f, "  work_list={}", self.work_list.path)?;
        writeln!(
            f,
            "  rate_limit={}/s, {}/10s, {}/min",
            self.rate_limit.per_second, self.rate_limit.per_ten_seconds, self.rate_limit.per_minute
        )?;
        writeln!(f, "  item_cooldown={}s", self.pacing.item_cooldown)?;
        writeln!(f, "  max_retries={}", self.api.max_retries)?;
        write!(f, ")")
    }
}

/// Reddit script-app credentials for the password grant
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
