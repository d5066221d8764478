//! crates/know_flow_client/src/config.rs
//!
//! Client configuration: where the API lives and how patient to be with it.

use std::time::Duration;

/// Default base URL of the Know-Flow API.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
/// Requests slower than this are aborted.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Retries after the first attempt for retryable failures.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Flat pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry_attempts: u32,
    /// The same delay is used before every retry; it does not grow.
    pub retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    /// Loads configuration from environment variables, falling back to defaults.
    ///
    /// A `.env` file is honoured outside of tests.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let base_url =
            std::env::var("KNOW_FLOW_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout = read_millis("KNOW_FLOW_TIMEOUT_MS")?.unwrap_or(DEFAULT_TIMEOUT);
        let retry_delay = read_millis("KNOW_FLOW_RETRY_DELAY_MS")?.unwrap_or(DEFAULT_RETRY_DELAY);
        let retry_attempts = match std::env::var("KNOW_FLOW_RETRY_ATTEMPTS") {
            Ok(raw) => raw.trim().parse::<u32>().map_err(|e| {
                ConfigError::InvalidValue("KNOW_FLOW_RETRY_ATTEMPTS".to_string(), e.to_string())
            })?,
            Err(_) => DEFAULT_RETRY_ATTEMPTS,
        };

        Ok(Self {
            base_url,
            timeout,
            retry_attempts,
            retry_delay,
        })
    }
}

fn read_millis(var: &str) -> Result<Option<Duration>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn builders_override_defaults() {
        let config = ClientConfig::new("http://api.test")
            .with_timeout(Duration::from_millis(250))
            .with_retries(1, Duration::from_millis(5));
        assert_eq!(config.base_url, "http://api.test");
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.retry_attempts, 1);
        assert_eq!(config.retry_delay, Duration::from_millis(5));
    }
}
