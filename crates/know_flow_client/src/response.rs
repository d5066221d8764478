//! crates/know_flow_client/src/response.rs
//!
//! Inspection of the `{ success, data, message }` / `{ success, error, details }`
//! envelopes returned by the API.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ClientError;

/// A response envelope decoded into either its payload or its failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome<T> {
    Success { data: T, message: Option<String> },
    Failure { error: String, details: Option<String> },
}

/// Stateless helpers over raw JSON responses.
pub struct ResponseHandler;

impl ResponseHandler {
    /// True only when the body carries `success: true`.
    pub fn is_success(response: &Value) -> bool {
        response.get("success").and_then(Value::as_bool) == Some(true)
    }

    /// The `data` member of a successful response; `None` for anything else.
    pub fn get_data(response: &Value) -> Option<&Value> {
        if !Self::is_success(response) {
            return None;
        }
        response.get("data").filter(|d| !d.is_null())
    }

    pub fn get_message(response: &Value) -> Option<&str> {
        response.get("message").and_then(Value::as_str)
    }

    /// The human-readable failure message, looked up as `error`, then `message`, then `detail`.
    pub fn get_error_message(response: &Value) -> Option<String> {
        ["error", "message", "detail"]
            .iter()
            .filter_map(|key| response.get(*key))
            .find_map(|value| match value {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Null | Value::String(_) => None,
                other => Some(other.to_string()),
            })
    }

    pub fn get_error_details(response: &Value) -> Option<String> {
        match response.get("details")? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Decodes an envelope, checking the payload against `T`.
    pub fn parse<T: DeserializeOwned>(response: Value) -> Result<ApiOutcome<T>, ClientError> {
        if !Self::is_success(&response) {
            return Ok(ApiOutcome::Failure {
                error: Self::get_error_message(&response)
                    .unwrap_or_else(|| "Request was not successful".to_string()),
                details: Self::get_error_details(&response),
            });
        }
        let message = Self::get_message(&response).map(str::to_string);
        let data = match response {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        };
        let data = serde_json::from_value(data)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        Ok(ApiOutcome::Success { data, message })
    }

    /// Unwraps the payload of a successful envelope, turning `success: false` into an error.
    pub fn into_data<T: DeserializeOwned>(response: Value) -> Result<T, ClientError> {
        match Self::parse(response)? {
            ApiOutcome::Success { data, .. } => Ok(data),
            ApiOutcome::Failure { error, .. } => Err(ClientError::Api {
                status: 200,
                message: error,
            }),
        }
    }
}
