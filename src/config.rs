// Process settings read from the environment, retry policy and log setup
use crate::mapping::DEFAULT_MAPPING_DIR;
use crate::schema::DEFAULT_SCHEMA_DIR;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_INTERNAL_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    // Exponential backoff for the given retry (0-based), capped at
    // max_backoff_ms and spread by the jitter factor.
    pub fn calculate_backoff(&self, retry_attempt: u32) -> Duration {
        let base_backoff_ms = (self.initial_backoff_ms as f64
            * self.backoff_multiplier.powf(retry_attempt as f64))
        .min(self.max_backoff_ms as f64);

        let jitter = rand::random::<f64>() * self.jitter_factor * base_backoff_ms;
        let backoff_ms = base_backoff_ms * (1.0 - self.jitter_factor / 2.0) + jitter;

        Duration::from_millis(backoff_ms as u64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub mapping_dir: PathBuf,
    pub schema_dir: PathBuf,
    pub internal_api_url: String,
    pub internal_api_timeout: Duration,
    pub retry: RetryConfig,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mapping_dir: PathBuf::from(DEFAULT_MAPPING_DIR),
            schema_dir: PathBuf::from(DEFAULT_SCHEMA_DIR),
            internal_api_url: DEFAULT_INTERNAL_API_URL.to_string(),
            internal_api_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    // Unset or blank variables fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Settings::default();

        let timeout_secs: u64 = parse_or(&get, "INTERNAL_API_TIMEOUT", 30)?;
        let retry_attempts: u32 = parse_or(&get, "INTERNAL_API_RETRY_ATTEMPTS", 3)?;
        let retry_delay_secs: f64 = parse_or(&get, "INTERNAL_API_RETRY_DELAY", 1.0)?;
        if !retry_delay_secs.is_finite() || retry_delay_secs < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "INTERNAL_API_RETRY_DELAY",
                value: retry_delay_secs.to_string(),
            });
        }

        let initial_backoff_ms = (retry_delay_secs * 1000.0) as u64;
        // INTERNAL_API_RETRY_ATTEMPTS counts every attempt, the first included
        let retry = RetryConfig {
            max_retries: retry_attempts.saturating_sub(1),
            initial_backoff_ms,
            max_backoff_ms: defaults.retry.max_backoff_ms.max(initial_backoff_ms),
            ..defaults.retry
        };

        Ok(Self {
            mapping_dir: get("MAPPING_DIR").map(PathBuf::from).unwrap_or(defaults.mapping_dir),
            schema_dir: get("SCHEMA_DIR").map(PathBuf::from).unwrap_or(defaults.schema_dir),
            internal_api_url: get("INTERNAL_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.internal_api_url),
            internal_api_timeout: Duration::from_secs(timeout_secs),
            retry,
            log_level: get("LOG_LEVEL")
                .map(|level| level.trim().to_lowercase())
                .unwrap_or(defaults.log_level),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(default),
    }
}

// RUST_LOG takes precedence over the configured level when set.
pub fn init_tracing(log_level: &str) -> Result<(), ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level).map_err(|e| ConfigError::Logging(e.to_string()))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}
