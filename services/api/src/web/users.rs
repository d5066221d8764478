//! services/api/src/web/users.rs
//!
//! Profile, preferences, and data export/import.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension,
};
use chrono::Utc;
use know_flow_core::domain::{LearningPlan, User};
use know_flow_core::knowledge::KnowledgeGraph;
use know_flow_core::ports::{PlanFilter, PortError};
use know_flow_core::protocol::{
    ApiErrorBody, ImportSummary, UpdatePreferencesRequest, UserExport, UserImport,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::web::generation::store_graph;
use crate::web::middleware::AuthUser;
use crate::web::plans::load_owned_plan;
use crate::web::response::{ok, ok_with, ApiFailure, ApiJson};
use crate::web::state::AppState;

/// Upper bound on preferred study time per day, in minutes.
const MAX_TIME_AVAILABILITY: u32 = 24 * 60;

/// Whether a lookup found something. `NotFound` is an answer, other errors propagate.
async fn exists<T>(
    lookup: impl std::future::Future<Output = Result<T, PortError>>,
) -> Result<bool, ApiFailure> {
    match lookup.await {
        Ok(_) => Ok(true),
        Err(PortError::NotFound(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Fetch the caller's profile.
#[utoipa::path(
    get,
    path = "/api/users/{uid}",
    tag = "Users",
    params(("uid" = String, Path, description = "The user's uid.")),
    responses(
        (status = 200, description = "The profile", body = User),
        (status = 403, description = "Not the caller", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, ApiFailure> {
    caller.ensure_owns(&uid)?;
    let user = state.db.get_user(&uid).await?;
    Ok(ok(user))
}

/// Update learning preferences and, optionally, the current goal.
#[utoipa::path(
    put,
    path = "/api/users/{uid}/preferences",
    tag = "Users",
    params(("uid" = String, Path, description = "The user's uid.")),
    request_body = UpdatePreferencesRequest,
    responses(
        (status = 200, description = "The updated profile", body = User),
        (status = 400, description = "Invalid preference", body = ApiErrorBody),
        (status = 403, description = "Not the caller, or a goal plan they do not own", body = ApiErrorBody),
        (status = 404, description = "Goal plan not found", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn update_preferences_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(uid): Path<String>,
    ApiJson(req): ApiJson<UpdatePreferencesRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    caller.ensure_owns(&uid)?;
    if let Some(minutes) = req.time_availability {
        if minutes == 0 || minutes > MAX_TIME_AVAILABILITY {
            return Err(ApiFailure::validation(format!(
                "time_availability must be between 1 and {} minutes",
                MAX_TIME_AVAILABILITY
            ))
            .with_details("time_availability"));
        }
    }
    if let Some(goal) = req.current_goal {
        load_owned_plan(&state, &caller, goal).await?;
    }

    let mut user = state.db.get_user(&uid).await?;
    req.apply(&mut user.preferences);
    if req.current_goal.is_some() {
        user.current_goal = req.current_goal;
    }
    state.db.update_user_profile(&user).await?;
    info!(%uid, "Preferences updated");
    Ok(ok_with(user, "Preferences updated"))
}

/// Export the profile, every plan and every study session.
#[utoipa::path(
    get,
    path = "/api/users/{uid}/export",
    tag = "Users",
    params(("uid" = String, Path, description = "The user's uid.")),
    responses(
        (status = 200, description = "Everything stored for the user", body = UserExport),
        (status = 403, description = "Not the caller", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn export_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, ApiFailure> {
    caller.ensure_owns(&uid)?;
    let user = state.db.get_user(&uid).await?;
    let (plans, _) = state.db.list_plans(&uid, &PlanFilter::default()).await?;
    let sessions = state.db.list_study_sessions(&uid).await?;
    info!(%uid, plans = plans.len(), sessions = sessions.len(), "User data exported");

    Ok(ok(UserExport {
        user,
        plans,
        sessions,
        exported_at: Utc::now(),
    }))
}

/// Import plans and sessions, typically from an earlier export.
///
/// Everything is re-owned by the caller. Records whose id already exists are skipped,
/// as are sessions that point at a plan the caller does not have. Scores are clamped
/// into range and each imported plan gets a knowledge graph derived from its lessons.
#[utoipa::path(
    post,
    path = "/api/users/{uid}/import",
    tag = "Users",
    params(("uid" = String, Path, description = "The user's uid.")),
    request_body = UserImport,
    responses(
        (status = 200, description = "What was imported and skipped", body = ImportSummary),
        (status = 400, description = "Malformed payload", body = ApiErrorBody),
        (status = 403, description = "Not the caller", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn import_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(uid): Path<String>,
    ApiJson(data): ApiJson<UserImport>,
) -> Result<impl IntoResponse, ApiFailure> {
    caller.ensure_owns(&uid)?;
    let mut summary = ImportSummary::default();

    // Plans the caller already owns are valid session targets.
    let (owned, _) = state.db.list_plans(&uid, &PlanFilter::default()).await?;
    let mut known_plans: HashSet<Uuid> = owned.iter().map(|p| p.id).collect();

    let mut fresh: Vec<LearningPlan> = Vec::new();
    for mut plan in data.plans {
        if known_plans.contains(&plan.id) || exists(state.db.get_plan(plan.id)).await? {
            summary.plans_skipped += 1;
            continue;
        }
        plan.user_id = uid.clone();
        for lesson in &mut plan.lessons {
            lesson.plan_id = plan.id;
        }
        plan.clamp_scores();
        plan.recompute_progress();
        known_plans.insert(plan.id);
        fresh.push(plan);
    }
    state.db.save_plans(&fresh).await?;
    summary.plans_imported = fresh.len();
    for plan in &fresh {
        store_graph(&state, &KnowledgeGraph::for_plan(plan, &[], &[])).await;
    }

    let mut seen_sessions: HashSet<Uuid> = HashSet::new();
    for mut session in data.sessions {
        let duplicate = !seen_sessions.insert(session.id)
            || exists(state.db.get_study_session(session.id)).await?;
        if duplicate || !known_plans.contains(&session.plan_id) {
            summary.sessions_skipped += 1;
            continue;
        }
        session.user_id = uid.clone();
        state.db.create_study_session(&session).await?;
        summary.sessions_imported += 1;
    }

    info!(
        %uid,
        plans = summary.plans_imported,
        plans_skipped = summary.plans_skipped,
        sessions = summary.sessions_imported,
        sessions_skipped = summary.sessions_skipped,
        "User data imported"
    );
    Ok(ok_with(summary, "Import finished"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exists_distinguishes_missing_from_failure() {
        assert!(exists(async { Ok::<_, PortError>(()) }).await.unwrap());
        assert!(!exists(async { Err::<(), _>(PortError::NotFound("x".into())) })
            .await
            .unwrap());
        let failure = exists(async { Err::<(), _>(PortError::Unexpected("db".into())) })
            .await
            .unwrap_err();
        assert_eq!(failure.status, axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
