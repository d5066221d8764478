//! services/api/src/web/knowledge.rs
//!
//! Read access to the knowledge graph built alongside each plan.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension,
};
use chrono::Utc;
use know_flow_core::protocol::{ApiErrorBody, KnowledgeGraphView};
use std::sync::Arc;

use crate::web::middleware::AuthUser;
use crate::web::plans::load_owned_plan;
use crate::web::response::{ok, parse_id, ApiFailure};
use crate::web::state::AppState;

/// Every concept and edge across the user's plans.
#[utoipa::path(
    get,
    path = "/api/users/{uid}/knowledge-graph",
    tag = "Knowledge",
    params(("uid" = String, Path, description = "The user's uid.")),
    responses(
        (status = 200, description = "The user's knowledge graph", body = KnowledgeGraphView),
        (status = 403, description = "Not the caller's graph", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn user_graph_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, ApiFailure> {
    caller.ensure_owns(&uid)?;
    let graph = state.db.knowledge_graph(&uid, None).await?;
    Ok(ok(KnowledgeGraphView::new(graph, Utc::now())))
}

/// The concepts taught by one plan.
#[utoipa::path(
    get,
    path = "/api/plans/{id}/knowledge-graph",
    tag = "Knowledge",
    params(("id" = uuid::Uuid, Path, description = "The plan id.")),
    responses(
        (status = 200, description = "The plan's knowledge graph", body = KnowledgeGraphView),
        (status = 403, description = "Not the caller's plan", body = ApiErrorBody),
        (status = 404, description = "No such plan", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn plan_graph_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiFailure> {
    let plan_id = parse_id(&id, "plan")?;
    let plan = load_owned_plan(&state, &caller, plan_id).await?;
    let graph = state.db.knowledge_graph(&plan.user_id, Some(plan_id)).await?;
    Ok(ok(KnowledgeGraphView::new(graph, Utc::now())))
}
