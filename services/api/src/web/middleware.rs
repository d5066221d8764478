//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use know_flow_core::ports::PortError;
use std::sync::Arc;
use tracing::{debug, error};

use crate::web::response::ApiFailure;
use crate::web::state::AppState;

/// The authenticated caller, inserted into request extensions by [`require_auth`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser(pub String);

impl AuthUser {
    pub fn uid(&self) -> &str {
        &self.0
    }

    /// Rejects access to resources owned by someone else.
    pub fn ensure_owns(&self, owner: &str) -> Result<(), ApiFailure> {
        if self.0 == owner {
            Ok(())
        } else {
            Err(ApiFailure::forbidden())
        }
    }
}

/// Middleware that validates the bearer token and extracts the caller's uid.
///
/// If valid, inserts an [`AuthUser`] into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiFailure> {
    // 1. Extract the bearer token
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiFailure::unauthorized("Authentication required"))?
        .to_string();

    // 2. The token is the uid of an existing user
    let user = state.db.get_user(&token).await.map_err(|e| match e {
        PortError::NotFound(_) => {
            debug!("Rejected bearer token for unknown user");
            ApiFailure::unauthorized("Invalid credentials")
        }
        other => {
            error!("Failed to validate bearer token: {:?}", other);
            ApiFailure::from(other)
        }
    })?;

    // 3. Insert the caller into request extensions
    req.extensions_mut().insert(AuthUser(user.uid));

    // 4. Continue to the handler
    Ok(next.run(req).await)
}
