//! services/api/src/web/analytics.rs
//!
//! Learning analytics, study recommendations and content search.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension,
};
use chrono::Utc;
use know_flow_core::analytics::{compute_analytics, Analytics, Timeframe};
use know_flow_core::insights::{recommend, search, Recommendation, SearchQuery};
use know_flow_core::ports::PlanFilter;
use know_flow_core::protocol::{ApiErrorBody, SearchResult};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use utoipa::IntoParams;

use crate::web::middleware::AuthUser;
use crate::web::plans::{parse_difficulty, parse_limit, split_list};
use crate::web::response::{ok, ApiFailure};
use crate::web::state::AppState;

const DEFAULT_RECOMMENDATIONS: usize = 5;
const DEFAULT_SEARCH_RESULTS: usize = 20;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AnalyticsQuery {
    /// `day`, `week`, `month`, `year` or `all`. Defaults to `week`.
    pub timeframe: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecommendationQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Free text; every whitespace separated term is matched on its own.
    pub q: Option<String>,
    pub difficulty: Option<String>,
    /// Comma separated topics.
    pub topics: Option<String>,
    /// Default 20, at most 100.
    pub limit: Option<String>,
}

fn parse_timeframe(raw: Option<&str>) -> Result<Timeframe, ApiFailure> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Timeframe::default()),
        Some(s) => s
            .parse::<Timeframe>()
            .map_err(|e| ApiFailure::validation(e.to_string()).with_details("timeframe")),
    }
}

impl SearchParams {
    fn to_query(&self) -> Result<(SearchQuery, usize), ApiFailure> {
        let text = self.q.as_deref().map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return Err(ApiFailure::validation("Search query is required").with_details("q"));
        }
        let query = SearchQuery {
            text: text.to_string(),
            difficulty: parse_difficulty(self.difficulty.as_deref())?,
            topics: split_list(self.topics.as_deref()),
        };
        let limit = parse_limit(self.limit.as_deref(), DEFAULT_SEARCH_RESULTS)?;
        Ok((query, limit))
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Study time, streaks, completion and mastery for one user.
#[utoipa::path(
    get,
    path = "/api/users/{uid}/analytics",
    tag = "Analytics",
    params(("uid" = String, Path, description = "The user's uid."), AnalyticsQuery),
    responses(
        (status = 200, description = "Aggregates over the timeframe", body = Analytics),
        (status = 400, description = "Unknown timeframe", body = ApiErrorBody),
        (status = 403, description = "Not the caller", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn analytics_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(uid): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, ApiFailure> {
    caller.ensure_owns(&uid)?;
    let timeframe = parse_timeframe(query.timeframe.as_deref())?;

    let (plans, _) = state.db.list_plans(&uid, &PlanFilter::default()).await?;
    let sessions = state.db.list_study_sessions(&uid).await?;
    Ok(ok(compute_analytics(&plans, &sessions, timeframe, Utc::now())))
}

/// What to study next.
#[utoipa::path(
    get,
    path = "/api/users/{uid}/recommendations",
    tag = "Analytics",
    params(("uid" = String, Path, description = "The user's uid."), RecommendationQuery),
    responses(
        (status = 200, description = "Ordered suggestions", body = [Recommendation]),
        (status = 403, description = "Not the caller", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn recommendations_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(uid): Path<String>,
    Query(query): Query<RecommendationQuery>,
) -> Result<impl IntoResponse, ApiFailure> {
    caller.ensure_owns(&uid)?;
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_RECOMMENDATIONS)?;

    let (plans, _) = state.db.list_plans(&uid, &PlanFilter::default()).await?;
    Ok(ok(recommend(&plans, limit)))
}

/// Search the caller's plans and lessons.
#[utoipa::path(
    get,
    path = "/api/search",
    tag = "Analytics",
    params(SearchParams),
    responses(
        (status = 200, description = "Ranked matches", body = [SearchResult]),
        (status = 400, description = "Missing query or bad filter", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiFailure> {
    let (query, limit) = params.to_query()?;

    let (plans, _) = state
        .db
        .list_plans(caller.uid(), &PlanFilter::default())
        .await?;
    let results = search(&plans, &query, limit);
    debug!(uid = %caller.uid(), hits = results.len(), "Search finished");
    Ok(ok(results))
}
