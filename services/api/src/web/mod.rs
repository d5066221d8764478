pub mod analytics;
pub mod auth;
pub mod generation;
pub mod knowledge;
pub mod middleware;
pub mod plans;
pub mod progress;
pub mod response;
pub mod rest;
pub mod state;
pub mod users;

pub use middleware::require_auth;
pub use rest::ApiDoc;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::web::state::AppState;

/// Request bodies larger than this are rejected before reaching a handler.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Builds every API route. CORS and Swagger UI are layered on by the binary.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(rest::root_handler))
        .route("/health", get(rest::health_handler))
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/users/{uid}", get(users::get_user_handler))
        .route(
            "/api/users/{uid}/preferences",
            put(users::update_preferences_handler),
        )
        .route("/api/users/{uid}/plans", get(plans::list_plans_handler))
        .route("/api/user/{uid}/plans", get(plans::list_plans_handler))
        .route(
            "/api/users/{uid}/knowledge-graph",
            get(knowledge::user_graph_handler),
        )
        .route("/api/users/{uid}/analytics", get(analytics::analytics_handler))
        .route(
            "/api/users/{uid}/recommendations",
            get(analytics::recommendations_handler),
        )
        .route("/api/users/{uid}/export", get(users::export_handler))
        .route("/api/users/{uid}/import", post(users::import_handler))
        .route(
            "/api/generate-learning-plan",
            post(generation::generate_learning_plan_handler),
        )
        .route(
            "/api/user-prompt",
            post(generation::user_prompt_handler).get(generation::user_prompt_query_handler),
        )
        .route("/api/plans/batch", post(generation::batch_generate_handler))
        .route(
            "/api/plans/{id}",
            get(plans::get_plan_handler).delete(plans::delete_plan_handler),
        )
        .route(
            "/api/plans/{id}/status",
            put(plans::update_plan_status_handler),
        )
        .route(
            "/api/plans/{id}/knowledge-graph",
            get(knowledge::plan_graph_handler),
        )
        .route("/api/sessions", post(progress::create_session_handler))
        .route("/api/sessions/{id}/end", post(progress::end_session_handler))
        .route("/api/progress", post(progress::update_progress_handler))
        .route("/api/search", get(analytics::search_handler))
        .route("/api/system/status", get(rest::system_status_handler))
        .route("/api/system/metrics", get(rest::system_metrics_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state)
}
