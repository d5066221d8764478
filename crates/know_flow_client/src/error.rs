//! crates/know_flow_client/src/error.rs
//!
//! Failures surfaced by the API client and the rule deciding which of them are retried.

use serde_json::Value;

use crate::response::ResponseHandler;

/// Message fragments (compared lowercased) that mark a failure as transient.
pub const RETRYABLE_SIGNATURES: &[&str] = &[
    "timeout",
    "network",
    "connection reset",
    "econnreset",
    "failed to fetch",
];

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Request timeout")]
    Timeout,
    #[error("Network error: {0}")]
    Network(String),
    /// 401 or 403 from the server.
    #[error("{message}")]
    Unauthorized { message: String },
    /// 400 or 422 from the server.
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<String>,
    },
    /// Any other non-2xx status, or a 2xx body with `success: false`.
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Builds the error for a non-2xx response, preferring the server's own message.
    pub fn from_status(status: u16, body: Option<&Value>) -> Self {
        let message = body
            .and_then(ResponseHandler::get_error_message)
            .unwrap_or_else(|| format!("HTTP error! status: {}", status));
        match status {
            401 | 403 => ClientError::Unauthorized { message },
            400 | 422 => ClientError::Validation {
                message,
                details: body.and_then(ResponseHandler::get_error_details),
            },
            _ => ClientError::Api { status, message },
        }
    }

    /// HTTP status behind this error, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether another attempt may succeed.
    ///
    /// Authentication and validation failures never are; everything else is judged
    /// by its message.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Unauthorized { .. }
            | ClientError::Validation { .. }
            | ClientError::InvalidRequest(_) => false,
            other => matches_retryable_signature(&other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else if e.is_builder() {
            ClientError::InvalidRequest(e.to_string())
        } else if e.is_decode() {
            ClientError::InvalidResponse(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

pub fn matches_retryable_signature(message: &str) -> bool {
    let message = message.to_lowercase();
    RETRYABLE_SIGNATURES.iter().any(|sig| message.contains(sig))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timeouts_and_network_failures_are_retryable() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::Network("connection refused".into()).is_retryable());
        assert!(ClientError::Api {
            status: 502,
            message: "upstream ECONNRESET".into()
        }
        .is_retryable());
    }

    #[test]
    fn plain_server_errors_are_not_retryable() {
        let err = ClientError::from_status(500, Some(&json!({ "error": "AI service unavailable" })));
        assert_eq!(err.to_string(), "AI service unavailable");
        assert!(!err.is_retryable());
    }

    #[test]
    fn auth_and_validation_are_never_retried() {
        let auth = ClientError::from_status(401, Some(&json!({ "error": "network token expired" })));
        assert!(matches!(auth, ClientError::Unauthorized { .. }));
        assert!(!auth.is_retryable());

        let invalid = ClientError::from_status(
            422,
            Some(&json!({ "error": "timeout must be positive", "details": "field: timeout" })),
        );
        match &invalid {
            ClientError::Validation { details, .. } => {
                assert_eq!(details.as_deref(), Some("field: timeout"))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!invalid.is_retryable());
    }

    #[test]
    fn message_falls_back_to_status_text() {
        let err = ClientError::from_status(404, None);
        assert_eq!(err.to_string(), "HTTP error! status: 404");
        assert_eq!(err.status(), Some(404));

        let detail = ClientError::from_status(503, Some(&json!({ "detail": "Service busy" })));
        assert_eq!(detail.to_string(), "Service busy");
    }

    #[test]
    fn signature_match_ignores_case() {
        assert!(matches_retryable_signature("Failed to fetch"));
        assert!(matches_retryable_signature("socket TIMEOUT"));
        assert!(!matches_retryable_signature("plan not found"));
    }
}
