//! services/api/src/web/progress.rs
//!
//! Study sessions and lesson progress.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use chrono::Utc;
use know_flow_core::domain::{LearningPlan, StudySession};
use know_flow_core::protocol::{ApiErrorBody, CreateSessionRequest, UpdateProgressRequest};
use std::sync::Arc;
use tracing::{info, warn};

use crate::web::middleware::AuthUser;
use crate::web::plans::load_owned_plan;
use crate::web::response::{ok, ok_with, parse_id, ApiFailure, ApiJson};
use crate::web::state::AppState;

/// Start a study session on one of the caller's plans.
#[utoipa::path(
    post,
    path = "/api/sessions",
    tag = "Progress",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session started", body = StudySession),
        (status = 403, description = "Not the caller's plan", body = ApiErrorBody),
        (status = 404, description = "No such plan", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    load_owned_plan(&state, &caller, req.plan_id).await?;

    let concepts = req
        .concepts
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    let session = StudySession::start(caller.uid(), req.plan_id, concepts, Utc::now());
    state.db.create_study_session(&session).await?;
    info!(session_id = %session.id, plan_id = %session.plan_id, "Study session started");
    Ok((StatusCode::CREATED, ok_with(session, "Study session started")))
}

/// End a study session. Ending an already ended session returns it unchanged.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/end",
    tag = "Progress",
    params(("id" = uuid::Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, description = "Session ended", body = StudySession),
        (status = 403, description = "Not the caller's session", body = ApiErrorBody),
        (status = 404, description = "No such session", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn end_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiFailure> {
    let session_id = parse_id(&id, "session")?;
    let mut session = state.db.get_study_session(session_id).await?;
    caller.ensure_owns(&session.user_id)?;

    if session.ended_at.is_none() {
        session.end(Utc::now());
        state.db.update_study_session(&session).await?;
        info!(%session_id, minutes = session.duration_minutes().unwrap_or(0), "Study session ended");
    }
    Ok(ok(session))
}

/// Mark a lesson complete or incomplete, optionally recording mastery.
///
/// Mastery outside `[0, 100]` is clamped. Plan progress and status are re-derived,
/// and concepts taught by the lesson are rescheduled for review.
#[utoipa::path(
    post,
    path = "/api/progress",
    tag = "Progress",
    request_body = UpdateProgressRequest,
    responses(
        (status = 200, description = "The updated plan", body = LearningPlan),
        (status = 403, description = "Not the caller's plan", body = ApiErrorBody),
        (status = 404, description = "No such plan or lesson", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn update_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<UpdateProgressRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let mut plan = load_owned_plan(&state, &caller, req.plan_id).await?;
    let now = Utc::now();

    let lesson = plan.lesson_mut(req.lesson_id).ok_or_else(|| {
        ApiFailure::not_found(format!(
            "Lesson {} not found in plan {}",
            req.lesson_id, req.plan_id
        ))
    })?;
    lesson.set_completed(req.completed, now);
    let reviewed = req.mastery_level.map(|level| {
        lesson.set_mastery(level);
        lesson.mastery_level
    });

    plan.recompute_progress();
    plan.last_accessed = now;
    state.db.update_plan(&plan).await?;
    if let Some(mastery) = reviewed {
        if let Err(e) = state.db.review_concepts(req.lesson_id, mastery, now).await {
            warn!(lesson_id = %req.lesson_id, "Failed to review concepts: {}", e);
        }
    }
    info!(plan_id = %plan.id, progress = plan.progress, "Lesson progress updated");
    Ok(ok(plan))
}
