use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::str::FromStr;

/// Environment variable overriding `crawler.concurrency`
pub const ENV_CONCURRENCY: &str = "SITESCAN_CONCURRENCY";
/// Environment variable overriding `crawler.max-depth`
pub const ENV_MAX_CRAWL_DEPTH: &str = "SITESCAN_MAX_CRAWL_DEPTH";
/// Environment variable overriding `crawler.max-redirect-threshold`
pub const ENV_MAX_REDIRECT_THRESHOLD: &str = "SITESCAN_MAX_REDIRECT_THRESHOLD";
/// Environment variable overriding `output.database-path`
pub const ENV_DATABASE_PATH: &str = "SITESCAN_DATABASE_PATH";

/// Loads and parses a configuration file from the given path
///
/// Missing keys fall back to their defaults; environment overrides are applied
/// before validation.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sitescan::config::load_config;
///
/// let config = load_config(Path::new("sitescan.toml")).unwrap();
/// println!("Concurrency: {}", config.crawler.concurrency);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;

    apply_env_overrides(&mut config)?;
    validate(&config)?;

    Ok(config)
}

/// Builds a configuration from defaults and the process environment only
pub fn default_config() -> Result<Config, ConfigError> {
    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    validate(&config)?;
    Ok(config)
}

/// Applies `SITESCAN_*` environment variables on top of `config`
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Applies overrides from an arbitrary key lookup
fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_CONCURRENCY) {
        config.crawler.concurrency = parse_env(ENV_CONCURRENCY, &value)?;
    }
    if let Some(value) = lookup(ENV_MAX_CRAWL_DEPTH) {
        config.crawler.max_depth = parse_env(ENV_MAX_CRAWL_DEPTH, &value)?;
    }
    if let Some(value) = lookup(ENV_MAX_REDIRECT_THRESHOLD) {
        config.crawler.max_redirect_threshold = parse_env(ENV_MAX_REDIRECT_THRESHOLD, &value)?;
    }
    if let Some(value) = lookup(ENV_DATABASE_PATH) {
        config.output.database_path = value;
    }
    Ok(())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at job start so a crawl can be tied to the settings it ran with.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
