//! crates/know_flow_core/src/protocol.rs
//!
//! Request and response bodies exchanged between the API service and its clients.
//!
//! Successful responses are wrapped as `{ "success": true, "data": ..., "message": ... }`,
//! failures as `{ "success": false, "error": ..., "details": ... }`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Difficulty, LearningContext, LearningPlan, LearningPreferences, Lesson, PlanStatus,
    StudySession, User,
};
use crate::knowledge::{ConceptEdge, ConceptNode, KnowledgeGraph};

//=========================================================================================
// Envelopes
//=========================================================================================

/// The success envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSuccess<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiSuccess<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }
}

/// The failure envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

//=========================================================================================
// Health & system
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SystemStatus {
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub storage: String,
    pub storage_healthy: bool,
    pub plan_model: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SystemMetrics {
    pub users: u64,
    pub plans: u64,
    pub lessons: u64,
    pub sessions: u64,
    pub prompts: u64,
    pub plans_generated: u64,
    pub generation_failures: u64,
}

//=========================================================================================
// Auth & users
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by signup and login. `uid` is the bearer credential for `/api` calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuthResponse {
    pub uid: String,
    pub email: String,
    pub display_name: String,
}

/// Partial update of a user's preferences; unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdatePreferencesRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_style: Option<crate::domain::LearningStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_availability: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_goal: Option<Uuid>,
}

impl UpdatePreferencesRequest {
    pub fn apply(&self, preferences: &mut LearningPreferences) {
        if let Some(style) = self.learning_style {
            preferences.learning_style = style;
        }
        if let Some(difficulty) = self.difficulty {
            preferences.difficulty = difficulty;
        }
        if let Some(minutes) = self.time_availability {
            preferences.time_availability = minutes;
        }
    }
}

//=========================================================================================
// Plan generation
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GenerateLearningPlanRequest {
    #[serde(rename = "userId", alias = "user_id")]
    pub user_id: String,
    pub prompt: String,
    #[serde(default)]
    pub context: LearningContext,
}

/// A lesson as listed in a freshly generated plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LessonOutline {
    #[serde(default, alias = "lesson_id")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub estimated_minutes: u32,
    #[serde(default)]
    pub order: u32,
}

impl From<&Lesson> for LessonOutline {
    fn from(lesson: &Lesson) -> Self {
        Self {
            id: Some(lesson.id.to_string()),
            title: lesson.title.clone(),
            objectives: lesson.objectives.clone(),
            estimated_minutes: lesson.estimated_minutes,
            order: lesson.order,
        }
    }
}

/// The payload returned by plan generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PlanSummary {
    #[serde(rename = "planId", alias = "plan_id", alias = "id")]
    pub id: String,
    #[serde(rename = "plan_title", alias = "title")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub lessons: Vec<LessonOutline>,
    #[serde(default)]
    pub estimated_duration: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl From<&LearningPlan> for PlanSummary {
    fn from(plan: &LearningPlan) -> Self {
        Self {
            id: plan.id.to_string(),
            title: plan.title.clone(),
            description: plan.description.clone(),
            lessons: plan.lessons.iter().map(LessonOutline::from).collect(),
            estimated_duration: plan.estimated_duration.clone(),
            difficulty: Some(plan.difficulty),
            quality_score: Some(plan.quality_score),
            topics: plan.topics.clone(),
        }
    }
}

/// Body (POST) or query string (GET) of the legacy `/api/user-prompt` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserPromptRequest {
    #[serde(rename = "userId", alias = "user_id", default)]
    pub user_id: String,
    #[serde(default)]
    pub prompt: String,
}

/// Response of the legacy `/api/user-prompt` endpoint (not enveloped).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserPromptResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub prompt: String,
    #[serde(rename = "planId", default)]
    pub plan_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BatchPlanItem {
    pub prompt: String,
    #[serde(default)]
    pub context: LearningContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BatchGenerateRequest {
    pub requests: Vec<BatchPlanItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BatchGenerateResponse {
    pub plans: Vec<PlanSummary>,
}

//=========================================================================================
// Plans, sessions, progress
//=========================================================================================

/// One page of a user's plans.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PlanPage {
    pub plans: Vec<LearningPlan>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

/// Client-side options for listing plans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanListOptions {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub status: Option<PlanStatus>,
    pub difficulty: Option<Difficulty>,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdatePlanStatusRequest {
    pub status: PlanStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateSessionRequest {
    pub plan_id: Uuid,
    #[serde(default)]
    pub concepts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateProgressRequest {
    pub plan_id: Uuid,
    pub lesson_id: Uuid,
    pub completed: bool,
    /// Any integer is accepted and clamped into `[0, 100]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mastery_level: Option<i64>,
}

//=========================================================================================
// Search
//=========================================================================================

/// Client-side search options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub difficulty: Option<Difficulty>,
    pub topics: Vec<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SearchResult {
    pub plan_id: Uuid,
    pub plan_title: String,
    #[serde(default)]
    pub lesson_id: Option<Uuid>,
    #[serde(default)]
    pub lesson_title: Option<String>,
    pub snippet: String,
    pub score: u32,
}

//=========================================================================================
// Knowledge graph
//=========================================================================================

/// A knowledge graph plus the ids of concepts whose review is due.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct KnowledgeGraphView {
    pub nodes: Vec<ConceptNode>,
    pub edges: Vec<ConceptEdge>,
    #[serde(default)]
    pub due_for_review: Vec<Uuid>,
}

impl KnowledgeGraphView {
    pub fn new(graph: KnowledgeGraph, now: DateTime<Utc>) -> Self {
        let due_for_review = graph.due_for_review(now).iter().map(|n| n.id).collect();
        Self {
            nodes: graph.nodes,
            edges: graph.edges,
            due_for_review,
        }
    }
}

//=========================================================================================
// Export / import
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserExport {
    pub user: User,
    pub plans: Vec<LearningPlan>,
    pub sessions: Vec<StudySession>,
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserImport {
    #[serde(default)]
    pub plans: Vec<LearningPlan>,
    #[serde(default)]
    pub sessions: Vec<StudySession>,
}

impl From<UserExport> for UserImport {
    fn from(export: UserExport) -> Self {
        Self {
            plans: export.plans,
            sessions: export.sessions,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ImportSummary {
    pub plans_imported: usize,
    pub plans_skipped: usize,
    pub sessions_imported: usize,
    pub sessions_skipped: usize,
}
