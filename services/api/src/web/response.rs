//! services/api/src/web/response.rs
//!
//! The response envelope, the request-time error type and a JSON extractor whose
//! rejections use that error type.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use know_flow_core::ports::PortError;
use know_flow_core::protocol::{ApiErrorBody, ApiSuccess};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

/// Wraps `data` in the success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<ApiSuccess<T>> {
    Json(ApiSuccess::new(data))
}

pub fn ok_with<T: Serialize>(data: T, message: impl Into<String>) -> Json<ApiSuccess<T>> {
    Json(ApiSuccess::with_message(data, message))
}

//=========================================================================================
// ApiFailure
//=========================================================================================

/// A failed request, rendered as `{ "success": false, "error": ..., "details": ... }`.
#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<String>,
}

impl ApiFailure {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn validation(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn unauthorized(error: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error)
    }

    pub fn forbidden() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "You do not have access to this resource",
        )
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            success: false,
            error: self.error,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<PortError> for ApiFailure {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(message) => Self::not_found(message),
            PortError::Unauthorized => Self::unauthorized("Unauthorized"),
            PortError::Forbidden(message) => Self::new(StatusCode::FORBIDDEN, message),
            PortError::Validation(message) => Self::validation(message),
            PortError::RateLimited(message) => Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                "AI service rate limit exceeded, please try again shortly",
            )
            .with_details(message),
            PortError::Upstream(message) => Self::new(StatusCode::BAD_GATEWAY, message),
            PortError::Unexpected(message) => {
                error!("Unexpected error: {}", message);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

/// Parses a path or query id, naming `what` in the 400 on failure.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiFailure> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiFailure::validation(format!("Invalid {} id '{}'", what, raw)))
}

//=========================================================================================
// ApiJson extractor
//=========================================================================================

/// Like `axum::Json`, but malformed bodies become a 400 envelope.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiFailure;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiFailure::validation("Invalid request body")
                .with_details(rejection.body_text())),
        }
    }
}
