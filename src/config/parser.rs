use crate::config::types::{Config, Credentials};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

const CREDENTIAL_VARS: [&str; 4] = [
    "REDDIT_CLIENT_ID",
    "REDDIT_CLIENT_SECRET",
    "REDDIT_USERNAME",
    "REDDIT_PASSWORD",
];

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use subreddit_scanner::config::load_config;
///
/// let config = load_config(Path::new("scanner.toml")).unwrap();
/// println!("Per-minute limit: {}", config.rate_limit.per_minute);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so runs made against a changed configuration can be
/// told apart.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Reads API credentials from the process environment
///
/// When `env_file` is given it is loaded first; otherwise a `.env` in the
/// working directory is used if present. Variables already set in the
/// environment win over file values.
pub fn load_credentials(env_file: Option<&Path>) -> Result<Credentials, ConfigError> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path).map_err(|e| {
                ConfigError::Validation(format!(
                    "Failed to load env file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            tracing::info!("Loaded environment from {}", path.display());
        }
        None => {
            if let Ok(path) = dotenvy::dotenv() {
                tracing::info!("Loaded environment from {}", path.display());
            }
        }
    }

    credentials_from(|key| std::env::var(key).ok())
}

/// Builds credentials from an arbitrary variable lookup
///
/// All four variables must be present and non-empty; the error lists
/// every missing name.
pub fn credentials_from<F>(lookup: F) -> Result<Credentials, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let values: Vec<Option<String>> = CREDENTIAL_VARS
        .iter()
        .map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
        .collect();

    let missing: Vec<&str> = CREDENTIAL_VARS
        .iter()
        .zip(&values)
        .filter(|(_, value)| value.is_none())
        .map(|(key, _)| *key)
        .collect();

    if !missing.is_empty() {
        return Err(ConfigError::MissingCredentials(missing.join(", ")));
    }

    let mut values = values.into_iter().flatten();
    match (values.next(), values.next(), values.next(), values.next()) {
        (Some(client_id), Some(client_secret), Some(username), Some(password)) => {
            Ok(Credentials {
                client_id,
                client_secret,
                username,
                password,
            })
        }
        _ => Err(ConfigError::MissingCredentials(CREDENTIAL_VARS.join(", "))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[rate-limit]
per-second = 1
per-ten-seconds = 8
per-minute = 40

[pacing]
item-cooldown = 5.0
batch-pause-interval = 75

[storage]
database-path = "./test.db"
stale-days = 14
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.rate_limit.per_second, 1);
        assert_eq!(config.rate_limit.per_minute, 40);
        assert_eq!(config.pacing.batch_pause_interval, 75);
        assert_eq!(config.storage.stale_days, 14);
        // Untouched sections keep their defaults
        assert_eq!(config.safety.max_consecutive_forbidden, 10);
        assert_eq!(config.work_list.min_popularity, 100);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = create_temp_config("");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.rate_limit.per_second, 2);
        assert_eq!(config.rate_limit.per_ten_seconds, 12);
        assert_eq!(config.safety.max_total_rate_limited, 3);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/scanner.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[rate-limit]
per-second = 20
per-ten-seconds = 12
per-minute = 60
"#;
        let file = create_temp_config(config_content);
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::Validation(_)
        ));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        assert_ne!(
            compute_config_hash(file1.path()).unwrap(),
            compute_config_hash(file2.path()).unwrap()
        );
    }

    #[test]
    fn test_credentials_complete() {
        let vars: HashMap<&str, &str> = [
            ("REDDIT_CLIENT_ID", "id"),
            ("REDDIT_CLIENT_SECRET", "secret"),
            ("REDDIT_USERNAME", "scanner_bot"),
            ("REDDIT_PASSWORD", "hunter2"),
        ]
        .into_iter()
        .collect();

        let creds = credentials_from(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(creds.client_id, "id");
        assert_eq!(creds.username, "scanner_bot");
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[test]
    fn test_credentials_lists_missing_names() {
        let err = credentials_from(|k| {
            (k == "REDDIT_CLIENT_ID").then(|| "id".to_string())
        })
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("REDDIT_CLIENT_SECRET"));
        assert!(message.contains("REDDIT_PASSWORD"));
        assert!(!message.contains("REDDIT_CLIENT_ID,"));
    }
}
