//! services/api/src/web/plans.rs
//!
//! Listing, reading, re-statusing and deleting learning plans.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension,
};
use chrono::Utc;
use know_flow_core::domain::{Difficulty, LearningPlan, PlanStatus};
use know_flow_core::ports::PlanFilter;
use know_flow_core::protocol::{ApiErrorBody, PlanPage, UpdatePlanStatusRequest};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::web::middleware::AuthUser;
use crate::web::response::{ok, ok_with, parse_id, ApiFailure, ApiJson};
use crate::web::state::AppState;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Loads a plan and checks that `caller` owns it.
pub(crate) async fn load_owned_plan(
    state: &AppState,
    caller: &AuthUser,
    plan_id: Uuid,
) -> Result<LearningPlan, ApiFailure> {
    let plan = state.db.get_plan(plan_id).await?;
    caller.ensure_owns(&plan.user_id)?;
    Ok(plan)
}

/// Splits a comma separated list, dropping blanks.
pub(crate) fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

pub(crate) fn parse_difficulty(raw: Option<&str>) -> Result<Option<Difficulty>, ApiFailure> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Difficulty>())
        .transpose()
        .map_err(|e| ApiFailure::validation(e.to_string()))
}

/// Parses a page size, falling back to `default` and capping at [`MAX_PAGE_SIZE`].
pub(crate) fn parse_limit(raw: Option<&str>, default: usize) -> Result<usize, ApiFailure> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(s) => s
            .parse::<usize>()
            .map(|n| n.clamp(1, MAX_PAGE_SIZE))
            .map_err(|_| ApiFailure::validation(format!("Invalid limit '{}'", s))),
    }
}

//=========================================================================================
// Query parameters
//=========================================================================================

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PlanListQuery {
    /// Page size, default 20, at most 100.
    pub limit: Option<String>,
    pub offset: Option<String>,
    /// `active`, `completed`, `paused` or `archived`.
    pub status: Option<String>,
    pub difficulty: Option<String>,
    /// Comma separated; a plan matches when it has any of them.
    pub topics: Option<String>,
}

impl PlanListQuery {
    fn to_filter(&self) -> Result<PlanFilter, ApiFailure> {
        let limit = parse_limit(self.limit.as_deref(), DEFAULT_PAGE_SIZE)?;
        let offset = match self.offset.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => 0,
            Some(s) => s
                .parse::<usize>()
                .map_err(|_| ApiFailure::validation(format!("Invalid offset '{}'", s)))?,
        };
        let status = self
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<PlanStatus>())
            .transpose()
            .map_err(|e| ApiFailure::validation(e.to_string()))?;

        Ok(PlanFilter {
            status,
            difficulty: parse_difficulty(self.difficulty.as_deref())?,
            topics: split_list(self.topics.as_deref()),
            limit: Some(limit),
            offset,
        })
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// List a user's plans, newest first.
#[utoipa::path(
    get,
    path = "/api/users/{uid}/plans",
    tag = "Plans",
    params(("uid" = String, Path, description = "The user's uid."), PlanListQuery),
    responses(
        (status = 200, description = "One page of plans", body = PlanPage),
        (status = 400, description = "Invalid filter", body = ApiErrorBody),
        (status = 403, description = "Not the caller's plans", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn list_plans_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(uid): Path<String>,
    Query(query): Query<PlanListQuery>,
) -> Result<impl IntoResponse, ApiFailure> {
    caller.ensure_owns(&uid)?;
    let filter = query.to_filter()?;
    let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    let (plans, total) = state.db.list_plans(&uid, &filter).await?;
    let has_more = filter.offset + plans.len() < total;
    Ok(ok(PlanPage {
        plans,
        total,
        limit,
        offset: filter.offset,
        has_more,
    }))
}

/// Fetch one plan with its lessons. Marks the plan as accessed.
#[utoipa::path(
    get,
    path = "/api/plans/{id}",
    tag = "Plans",
    params(("id" = Uuid, Path, description = "The plan id.")),
    responses(
        (status = 200, description = "The plan", body = LearningPlan),
        (status = 403, description = "Not the caller's plan", body = ApiErrorBody),
        (status = 404, description = "No such plan", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn get_plan_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiFailure> {
    let plan_id = parse_id(&id, "plan")?;
    let mut plan = load_owned_plan(&state, &caller, plan_id).await?;

    let now = Utc::now();
    match state.db.touch_plan(plan_id, now).await {
        Ok(()) => plan.last_accessed = now,
        Err(e) => warn!(%plan_id, "Failed to record plan access: {}", e),
    }
    Ok(ok(plan))
}

/// Change a plan's status.
#[utoipa::path(
    put,
    path = "/api/plans/{id}/status",
    tag = "Plans",
    params(("id" = Uuid, Path, description = "The plan id.")),
    request_body = UpdatePlanStatusRequest,
    responses(
        (status = 200, description = "The updated plan", body = LearningPlan),
        (status = 400, description = "Unknown status", body = ApiErrorBody),
        (status = 403, description = "Not the caller's plan", body = ApiErrorBody),
        (status = 404, description = "No such plan", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn update_plan_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdatePlanStatusRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let plan_id = parse_id(&id, "plan")?;
    let mut plan = load_owned_plan(&state, &caller, plan_id).await?;

    plan.status = req.status;
    plan.last_accessed = Utc::now();
    state.db.update_plan(&plan).await?;
    info!(%plan_id, status = %plan.status, "Plan status changed");
    Ok(ok_with(plan, "Plan status updated"))
}

/// Delete a plan and its lessons.
#[utoipa::path(
    delete,
    path = "/api/plans/{id}",
    tag = "Plans",
    params(("id" = Uuid, Path, description = "The plan id.")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 403, description = "Not the caller's plan", body = ApiErrorBody),
        (status = 404, description = "No such plan", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn delete_plan_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiFailure> {
    let plan_id = parse_id(&id, "plan")?;
    load_owned_plan(&state, &caller, plan_id).await?;

    state.db.delete_plan(plan_id).await?;

    // A deleted plan can no longer be the user's goal.
    let mut user = state.db.get_user(caller.uid()).await?;
    if user.current_goal == Some(plan_id) {
        user.current_goal = None;
        state.db.update_user_profile(&user).await?;
    }
    info!(%plan_id, "Plan deleted");
    Ok(ok_with(serde_json::json!({ "id": plan_id }), "Plan deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_defaults_and_caps() {
        let filter = PlanListQuery::default().to_filter().unwrap();
        assert_eq!(filter.limit, Some(DEFAULT_PAGE_SIZE));
        assert_eq!(filter.offset, 0);

        let filter = PlanListQuery {
            limit: Some("500".into()),
            topics: Some(" Rust, ,Async ".into()),
            status: Some("ACTIVE".into()),
            ..Default::default()
        }
        .to_filter()
        .unwrap();
        assert_eq!(filter.limit, Some(MAX_PAGE_SIZE));
        assert_eq!(filter.topics, vec!["rust", "async"]);
        assert_eq!(filter.status, Some(PlanStatus::Active));
    }

    #[test]
    fn bad_query_values_are_rejected() {
        let bad_status = PlanListQuery {
            status: Some("sleeping".into()),
            ..Default::default()
        };
        assert_eq!(bad_status.to_filter().unwrap_err().status, axum::http::StatusCode::BAD_REQUEST);

        let bad_limit = PlanListQuery {
            limit: Some("ten".into()),
            ..Default::default()
        };
        assert!(bad_limit.to_filter().is_err());
    }
}
