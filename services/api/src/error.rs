//! services/api/src/error.rs
//!
//! Failures that stop the service from starting or serving. Per-request
//! failures are `web::response::ApiFailure` instead.

use crate::config::ConfigError;
use know_flow_core::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The chosen storage backend failed its startup check.
    #[error("Storage unavailable: {0}")]
    Storage(#[from] PortError),

    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migrations failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Binding the listener or serving connections.
    #[error("Server I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Startup failed: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_check_failures_keep_their_cause() {
        fn check() -> Result<(), ApiError> {
            Err(PortError::Unexpected("connection refused".into()))?;
            Ok(())
        }
        let err = check().unwrap_err();
        assert!(matches!(err, ApiError::Storage(_)));
        assert_eq!(
            err.to_string(),
            "Storage unavailable: An unexpected error occurred: connection refused"
        );
    }
}
