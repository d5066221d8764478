//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// When unset, plans and users live in process memory.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub plan_model: String,
    pub max_lessons_per_plan: usize,
    pub max_external_resources_per_lesson: usize,
    pub cors_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8000)),
            database_url: None,
            log_level: Level::INFO,
            openai_api_key: String::new(),
            openai_base_url: None,
            plan_model: "gpt-4o-mini".to_string(),
            max_lessons_per_plan: 10,
            max_external_resources_per_lesson: 5,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let defaults = Self::default();

        // --- Load Server and Database Settings ---
        let bind_address = match std::env::var("BIND_ADDRESS") {
            Ok(raw) => raw.parse::<SocketAddr>().map_err(|e| {
                ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
            })?,
            Err(_) => defaults.bind_address,
        };

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load the LLM Settings ---
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;
        let openai_base_url = std::env::var("OPENAI_BASE_URL").ok();
        let plan_model = std::env::var("PLAN_MODEL").unwrap_or(defaults.plan_model);

        let max_lessons_per_plan =
            read_limit("MAX_LESSONS_PER_PLAN", defaults.max_lessons_per_plan)?;
        let max_external_resources_per_lesson = read_limit(
            "MAX_EXTERNAL_RESOURCES_PER_LESSON",
            defaults.max_external_resources_per_lesson,
        )?;

        let cors_origin = std::env::var("CORS_ORIGIN").unwrap_or(defaults.cors_origin);

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            openai_base_url,
            plan_model,
            max_lessons_per_plan,
            max_external_resources_per_lesson,
            cors_origin,
        })
    }
}

fn read_limit(var: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => match raw.trim().parse::<usize>() {
            Ok(0) => Err(ConfigError::InvalidValue(
                var.to_string(),
                "must be at least 1".to_string(),
            )),
            Ok(n) => Ok(n),
            Err(e) => Err(ConfigError::InvalidValue(var.to_string(), e.to_string())),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.bind_address.port(), 8000);
        assert_eq!(config.max_lessons_per_plan, 10);
        assert_eq!(config.max_external_resources_per_lesson, 5);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn zero_limit_is_rejected() {
        std::env::set_var("KF_TEST_ZERO_LIMIT", "0");
        assert!(read_limit("KF_TEST_ZERO_LIMIT", 10).is_err());
        std::env::set_var("KF_TEST_ZERO_LIMIT", "7");
        assert_eq!(read_limit("KF_TEST_ZERO_LIMIT", 10).unwrap(), 7);
        assert_eq!(read_limit("KF_TEST_UNSET_LIMIT", 10).unwrap(), 10);
    }
}
