//! services/api/src/web/generation.rs
//!
//! Plan generation endpoints: single prompt, the legacy user-prompt form, and batches.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use futures::future::try_join_all;
use know_flow_core::domain::{LearningContext, LearningPlan, PromptRecord, PromptStatus, User};
use know_flow_core::knowledge::KnowledgeGraph;
use know_flow_core::ports::{PlanRequest, PortError};
use know_flow_core::protocol::{
    ApiErrorBody, BatchGenerateRequest, BatchGenerateResponse, GenerateLearningPlanRequest,
    PlanSummary, UserPromptRequest, UserPromptResponse,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::web::middleware::AuthUser;
use crate::web::response::{ok_with, ApiFailure, ApiJson};
use crate::web::state::AppState;

pub const MAX_PROMPT_CHARS: usize = 2000;
pub const MAX_BATCH_REQUESTS: usize = 5;

/// Trims a prompt and checks it is neither empty nor too long.
pub(crate) fn validate_prompt(prompt: &str) -> Result<String, ApiFailure> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(ApiFailure::validation("Prompt is required").with_details("prompt"));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ApiFailure::validation(format!(
            "Prompt must be at most {} characters",
            MAX_PROMPT_CHARS
        ))
        .with_details("prompt"));
    }
    Ok(prompt.to_string())
}

/// Generates one plan for `user`, stores it and makes it the user's current goal.
///
/// The prompt is tracked as `processing` until generation settles.
async fn generate_and_store(
    state: &AppState,
    mut user: User,
    prompt: String,
    context: LearningContext,
) -> Result<LearningPlan, ApiFailure> {
    let record = PromptRecord {
        id: Uuid::new_v4(),
        user_id: user.uid.clone(),
        prompt: prompt.clone(),
        status: PromptStatus::Processing,
        plan_id: None,
        created_at: Utc::now(),
    };
    state.db.record_prompt(&record).await?;

    let request = PlanRequest {
        user_id: user.uid.clone(),
        prompt: prompt.clone(),
        context: context.with_defaults(&user.preferences),
    };
    let generated = match state.planner.generate_plan(&request).await {
        Ok(generated) => generated,
        Err(e) => {
            error!(uid = %user.uid, "Plan generation failed: {}", e);
            state.counters.record_failure();
            mark_prompt(state, record.id, PromptStatus::Failed, None).await;
            return Err(e.into());
        }
    };

    let (plan, graph) =
        LearningPlan::from_generated_with_graph(&user.uid, &prompt, generated, Utc::now());
    if let Err(e) = state.db.save_plan(&plan).await {
        mark_prompt(state, record.id, PromptStatus::Failed, None).await;
        return Err(e.into());
    }
    store_graph(state, &graph).await;
    mark_prompt(state, record.id, PromptStatus::Completed, Some(plan.id)).await;
    state.counters.record_success(1);

    user.current_goal = Some(plan.id);
    if let Err(e) = state.db.update_user_profile(&user).await {
        warn!(uid = %user.uid, "Failed to set current goal: {}", e);
    }
    info!(uid = %user.uid, plan_id = %plan.id, lessons = plan.lessons.len(), "Learning plan stored");
    Ok(plan)
}

/// The plan is already stored, so a graph failure is logged rather than returned.
pub(crate) async fn store_graph(state: &AppState, graph: &KnowledgeGraph) {
    if let Err(e) = state.db.save_knowledge_graph(graph).await {
        warn!(concepts = graph.nodes.len(), "Failed to store knowledge graph: {}", e);
    }
}

async fn mark_prompt(state: &AppState, id: Uuid, status: PromptStatus, plan_id: Option<Uuid>) {
    if let Err(e) = state.db.update_prompt_status(id, status, plan_id).await {
        warn!(prompt_id = %id, "Failed to update prompt status: {}", e);
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Generate a learning plan from a free-text prompt.
#[utoipa::path(
    post,
    path = "/api/generate-learning-plan",
    tag = "Learning",
    request_body = GenerateLearningPlanRequest,
    responses(
        (status = 200, description = "The generated plan", body = PlanSummary),
        (status = 400, description = "Invalid prompt", body = ApiErrorBody),
        (status = 403, description = "userId is not the caller", body = ApiErrorBody),
        (status = 429, description = "AI rate limit", body = ApiErrorBody),
        (status = 502, description = "AI service error", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn generate_learning_plan_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<GenerateLearningPlanRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    caller.ensure_owns(&req.user_id)?;
    let prompt = validate_prompt(&req.prompt)?;
    let user = state.db.get_user(caller.uid()).await?;

    let plan = generate_and_store(&state, user, prompt, req.context).await?;
    Ok(ok_with(
        PlanSummary::from(&plan),
        "Learning plan generated successfully",
    ))
}

/// Submit a prompt using the user's stored preferences as context.
#[utoipa::path(
    post,
    path = "/api/user-prompt",
    tag = "Learning",
    request_body = UserPromptRequest,
    responses(
        (status = 200, description = "Prompt processed", body = UserPromptResponse),
        (status = 400, description = "Invalid prompt", body = ApiErrorBody),
        (status = 502, description = "AI service error", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn user_prompt_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<UserPromptRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    answer_user_prompt(&state, &caller, req).await
}

/// The query-string form of the user-prompt endpoint.
#[utoipa::path(
    get,
    path = "/api/user-prompt",
    tag = "Learning",
    params(
        ("userId" = String, Query, description = "Must be the caller's uid."),
        ("prompt" = String, Query, description = "What the user wants to learn.")
    ),
    responses(
        (status = 200, description = "Prompt processed", body = UserPromptResponse),
        (status = 400, description = "Missing userId or invalid prompt", body = ApiErrorBody),
        (status = 502, description = "AI service error", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn user_prompt_query_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Query(req): Query<UserPromptRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    answer_user_prompt(&state, &caller, req).await
}

async fn answer_user_prompt(
    state: &AppState,
    caller: &AuthUser,
    req: UserPromptRequest,
) -> Result<Json<UserPromptResponse>, ApiFailure> {
    if req.user_id.trim().is_empty() {
        return Err(ApiFailure::validation("Missing userId").with_details("userId"));
    }
    caller.ensure_owns(&req.user_id)?;
    let prompt = validate_prompt(&req.prompt)?;
    let user = state.db.get_user(caller.uid()).await?;

    let plan = generate_and_store(state, user, prompt.clone(), LearningContext::default()).await?;
    Ok(Json(UserPromptResponse {
        success: true,
        message: "Prompt received and learning plan generated".to_string(),
        user_id: req.user_id,
        prompt,
        plan_id: Some(plan.id.to_string()),
    }))
}

/// Generate several plans at once. Nothing is stored unless every generation succeeds.
#[utoipa::path(
    post,
    path = "/api/plans/batch",
    tag = "Learning",
    request_body = BatchGenerateRequest,
    responses(
        (status = 200, description = "All generated plans", body = BatchGenerateResponse),
        (status = 400, description = "Empty or oversized batch, or an invalid prompt", body = ApiErrorBody),
        (status = 502, description = "A generation failed; nothing was stored", body = ApiErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn batch_generate_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<BatchGenerateRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    if req.requests.is_empty() {
        return Err(ApiFailure::validation("At least one request is required"));
    }
    if req.requests.len() > MAX_BATCH_REQUESTS {
        return Err(ApiFailure::validation(format!(
            "A batch holds at most {} requests",
            MAX_BATCH_REQUESTS
        )));
    }
    let user = state.db.get_user(caller.uid()).await?;

    let mut requests = Vec::with_capacity(req.requests.len());
    for item in req.requests {
        requests.push(PlanRequest {
            user_id: user.uid.clone(),
            prompt: validate_prompt(&item.prompt)?,
            context: item.context.with_defaults(&user.preferences),
        });
    }

    let generated = try_join_all(requests.iter().map(|r| state.planner.generate_plan(r)))
        .await
        .map_err(|e: PortError| {
            error!(uid = %user.uid, "Batch generation failed: {}", e);
            state.counters.record_failure();
            ApiFailure::from(e)
        })?;

    let now = Utc::now();
    let (plans, graphs): (Vec<LearningPlan>, Vec<KnowledgeGraph>) = requests
        .iter()
        .zip(generated)
        .map(|(request, plan)| {
            LearningPlan::from_generated_with_graph(&user.uid, &request.prompt, plan, now)
        })
        .unzip();
    state.db.save_plans(&plans).await?;
    for graph in &graphs {
        store_graph(&state, graph).await;
    }
    state.counters.record_success(plans.len() as u64);
    info!(uid = %user.uid, count = plans.len(), "Batch of learning plans stored");

    Ok(ok_with(
        BatchGenerateResponse {
            plans: plans.iter().map(PlanSummary::from).collect(),
        },
        format!("Generated {} learning plans", plans.len()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_validation() {
        assert_eq!(validate_prompt("  Learn Rust \n").unwrap(), "Learn Rust");
        assert!(validate_prompt("   ").is_err());
        assert!(validate_prompt(&"x".repeat(MAX_PROMPT_CHARS)).is_ok());
        assert!(validate_prompt(&"x".repeat(MAX_PROMPT_CHARS + 1)).is_err());
    }
}
