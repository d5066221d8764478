//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup and login.
//!
//! Both return the user's uid, which clients send back as `Authorization: Bearer <uid>`.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use know_flow_core::ports::PortError;
use know_flow_core::protocol::{ApiErrorBody, AuthResponse, LoginRequest, SignupRequest};
use std::sync::Arc;
use tracing::{error, info};

use crate::web::response::{ok, ok_with, ApiFailure, ApiJson};
use crate::web::state::AppState;

const MIN_PASSWORD_LENGTH: usize = 8;

fn invalid_credentials() -> ApiFailure {
    ApiFailure::unauthorized("Invalid email or password")
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "Auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request or email already registered", body = ApiErrorBody),
        (status = 500, description = "Internal server error", body = ApiErrorBody)
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(ApiFailure::validation("A valid email address is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiFailure::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiFailure::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password")
        })?
        .to_string();

    // 2. Create user in database
    let user = state
        .db
        .create_user(&email, &password_hash, &display_name)
        .await
        .map_err(|e| {
            error!("Failed to create user: {:?}", e);
            ApiFailure::from(e)
        })?;
    info!(uid = %user.uid, "User signed up");

    let response = AuthResponse {
        uid: user.uid,
        email: user.email,
        display_name: user.display_name,
    };
    Ok((StatusCode::CREATED, ok_with(response, "Account created")))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ApiErrorBody),
        (status = 500, description = "Internal server error", body = ApiErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let email = req.email.trim().to_lowercase();

    // 1. Get user by email
    let user_creds = state
        .db
        .get_user_by_email(&email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => invalid_credentials(),
            other => {
                error!("Failed to get user: {:?}", other);
                ApiFailure::from(other)
            }
        })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiFailure::new(StatusCode::INTERNAL_SERVER_ERROR, "Authentication error")
    })?;
    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(invalid_credentials());
    }

    // 3. Load the profile for the display name
    let user = state.db.get_user(&user_creds.uid).await?;

    Ok(ok(AuthResponse {
        uid: user.uid,
        email: user.email,
        display_name: user.display_name,
    }))
}
