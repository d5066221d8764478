//! services/api/src/web/rest.rs
//!
//! Service-level REST handlers (banner, health, system status and metrics) and the
//! master definition for the OpenAPI specification.

use crate::web::middleware::AuthUser;
use crate::web::response::{ok, ApiFailure};
use crate::web::state::AppState;
use crate::web::{analytics, auth, generation, knowledge, plans, progress, users};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::Utc;
use know_flow_core::protocol::{HealthStatus, SystemMetrics, SystemStatus};
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

pub const SERVICE_NAME: &str = "know-flow-api";

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        root_handler,
        health_handler,
        system_status_handler,
        system_metrics_handler,
        auth::signup_handler,
        auth::login_handler,
        users::get_user_handler,
        users::update_preferences_handler,
        users::export_handler,
        users::import_handler,
        generation::generate_learning_plan_handler,
        generation::user_prompt_handler,
        generation::user_prompt_query_handler,
        generation::batch_generate_handler,
        plans::list_plans_handler,
        plans::get_plan_handler,
        plans::update_plan_status_handler,
        plans::delete_plan_handler,
        knowledge::user_graph_handler,
        knowledge::plan_graph_handler,
        progress::create_session_handler,
        progress::end_session_handler,
        progress::update_progress_handler,
        analytics::analytics_handler,
        analytics::recommendations_handler,
        analytics::search_handler,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Know-Flow Learning API", description = "AI-generated learning plans, progress tracking and analytics."),
        (name = "Auth", description = "Signup and login; the returned uid is the bearer credential."),
        (name = "Learning", description = "Plan generation from free-text prompts."),
        (name = "Plans", description = "Stored learning plans."),
        (name = "Progress", description = "Study sessions and lesson completion."),
        (name = "Knowledge", description = "Concepts, their relationships and review schedule."),
        (name = "Analytics", description = "Analytics, recommendations and search."),
        (name = "Users", description = "Profile, preferences, export and import.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .description(Some("The uid returned by signup or login."))
                    .build(),
            ),
        );
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Service banner.
#[utoipa::path(
    get,
    path = "/",
    tag = "Know-Flow Learning API",
    responses((status = 200, description = "The service is running"))
)]
pub async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "message": "Know-Flow Learning API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}

/// Liveness plus a storage ping.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Know-Flow Learning API",
    responses(
        (status = 200, description = "Healthy", body = HealthStatus),
        (status = 503, description = "Storage unreachable", body = HealthStatus)
    )
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, health, database) = match state.db.ping().await {
        Ok(()) => (StatusCode::OK, "healthy", "connected"),
        Err(e) => {
            error!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "disconnected")
        }
    };
    (
        status,
        Json(HealthStatus {
            status: health.to_string(),
            database: database.to_string(),
            timestamp: Utc::now(),
        }),
    )
}

/// Version, uptime and storage backend.
#[utoipa::path(
    get,
    path = "/api/system/status",
    tag = "Know-Flow Learning API",
    responses((status = 200, description = "Service status", body = SystemStatus)),
    security(("bearer" = []))
)]
pub async fn system_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(_caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiFailure> {
    let storage_healthy = state.db.ping().await.is_ok();
    Ok(ok(SystemStatus {
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        storage: state.storage.to_string(),
        storage_healthy,
        plan_model: state.config.plan_model.clone(),
    }))
}

/// Row counts and generation counters.
#[utoipa::path(
    get,
    path = "/api/system/metrics",
    tag = "Know-Flow Learning API",
    responses((status = 200, description = "Service metrics", body = SystemMetrics)),
    security(("bearer" = []))
)]
pub async fn system_metrics_handler(
    State(state): State<Arc<AppState>>,
    Extension(_caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiFailure> {
    let counts = state.db.counts().await?;
    Ok(ok(SystemMetrics {
        users: counts.users,
        plans: counts.plans,
        lessons: counts.lessons,
        sessions: counts.sessions,
        prompts: counts.prompts,
        plans_generated: state.counters.plans_generated(),
        generation_failures: state.counters.generation_failures(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_every_route_and_the_bearer_scheme() {
        let doc = ApiDoc::openapi();
        for path in [
            "/",
            "/health",
            "/auth/signup",
            "/api/generate-learning-plan",
            "/api/users/{uid}/plans",
            "/api/plans/{id}/status",
            "/api/sessions/{id}/end",
            "/api/search",
            "/api/users/{uid}/import",
            "/api/users/{uid}/knowledge-graph",
            "/api/plans/{id}/knowledge-graph",
            "/api/system/metrics",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }

        let prompt = &doc.paths.paths["/api/user-prompt"];
        assert!(prompt.get.is_some() && prompt.post.is_some());

        let end_session = doc.paths.paths["/api/sessions/{id}/end"]
            .post
            .as_ref()
            .expect("end session operation");
        let params = end_session.parameters.as_ref().expect("path parameters");
        assert!(params.iter().any(|p| p.name == "id"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
