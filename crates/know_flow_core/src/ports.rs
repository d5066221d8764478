//! crates/know_flow_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or LLM APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Difficulty, GeneratedPlan, LearningContext, LearningPlan, PlanStatus, PromptRecord,
    PromptStatus, StudySession, User, UserCredentials,
};
use crate::knowledge::KnowledgeGraph;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("{0}")]
    Upstream(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Query helpers
//=========================================================================================

/// Filter and pagination applied when listing a user's plans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanFilter {
    pub status: Option<PlanStatus>,
    pub difficulty: Option<Difficulty>,
    /// Lowercased topics; a plan matches when it carries any of them.
    pub topics: Vec<String>,
    /// `None` returns every matching plan.
    pub limit: Option<usize>,
    pub offset: usize,
}

impl PlanFilter {
    /// Whether `plan` passes the status, difficulty and topic filters (pagination aside).
    pub fn matches(&self, plan: &LearningPlan) -> bool {
        if self.status.is_some_and(|s| s != plan.status) {
            return false;
        }
        if self.difficulty.is_some_and(|d| d != plan.difficulty) {
            return false;
        }
        if self.topics.is_empty() {
            return true;
        }
        plan.topics
            .iter()
            .any(|t| self.topics.iter().any(|wanted| t.eq_ignore_ascii_case(wanted)))
    }
}

/// Row counts reported by the system metrics endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub users: u64,
    pub plans: u64,
    pub lessons: u64,
    pub sessions: u64,
    pub prompts: u64,
}

/// A prompt plus the learner context it should be answered for.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub user_id: String,
    pub prompt: String,
    pub context: LearningContext,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
    ) -> PortResult<User>;

    async fn get_user(&self, uid: &str) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    /// Persists preferences and current goal.
    async fn update_user_profile(&self, user: &User) -> PortResult<()>;

    // --- Prompts ---
    async fn record_prompt(&self, prompt: &PromptRecord) -> PortResult<()>;

    async fn update_prompt_status(
        &self,
        prompt_id: Uuid,
        status: PromptStatus,
        plan_id: Option<Uuid>,
    ) -> PortResult<()>;

    // --- Plans ---
    /// Inserts plans with their lessons. Either every plan is stored or none is.
    async fn save_plans(&self, plans: &[LearningPlan]) -> PortResult<()>;

    async fn save_plan(&self, plan: &LearningPlan) -> PortResult<()> {
        self.save_plans(std::slice::from_ref(plan)).await
    }

    async fn get_plan(&self, plan_id: Uuid) -> PortResult<LearningPlan>;

    /// Returns one page of matching plans (newest first) and the total match count.
    async fn list_plans(
        &self,
        user_id: &str,
        filter: &PlanFilter,
    ) -> PortResult<(Vec<LearningPlan>, usize)>;

    /// Writes status, progress, access time and per-lesson completion state.
    async fn update_plan(&self, plan: &LearningPlan) -> PortResult<()>;

    /// Sets only `last_accessed`, leaving status and lesson state alone.
    async fn touch_plan(&self, plan_id: Uuid, at: DateTime<Utc>) -> PortResult<()>;

    /// Deletes a plan with its lessons and concepts.
    async fn delete_plan(&self, plan_id: Uuid) -> PortResult<()>;

    // --- Knowledge Graph ---
    async fn save_knowledge_graph(&self, graph: &KnowledgeGraph) -> PortResult<()>;

    /// The user's concepts and edges, optionally narrowed to one plan.
    async fn knowledge_graph(
        &self,
        user_id: &str,
        plan_id: Option<Uuid>,
    ) -> PortResult<KnowledgeGraph>;

    /// Reviews every concept taught by `lesson_id` at the given mastery.
    async fn review_concepts(
        &self,
        lesson_id: Uuid,
        mastery: u8,
        at: DateTime<Utc>,
    ) -> PortResult<()>;

    // --- Study Sessions ---
    async fn create_study_session(&self, session: &StudySession) -> PortResult<()>;

    async fn get_study_session(&self, session_id: Uuid) -> PortResult<StudySession>;

    async fn update_study_session(&self, session: &StudySession) -> PortResult<()>;

    async fn list_study_sessions(&self, user_id: &str) -> PortResult<Vec<StudySession>>;

    // --- Operations ---
    async fn ping(&self) -> PortResult<()>;

    async fn counts(&self) -> PortResult<StoreCounts>;
}

#[async_trait]
pub trait PlanGenerationService: Send + Sync {
    /// Turns a free-text prompt into a validated learning plan.
    async fn generate_plan(&self, request: &PlanRequest) -> PortResult<GeneratedPlan>;
}
