//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use know_flow_core::domain::{
    LearningPlan, LearningPreferences, Lesson, PromptRecord, PromptStatus, StudySession, User,
    UserCredentials,
};
use know_flow_core::knowledge::{review_interval, ConceptEdge, ConceptNode, KnowledgeGraph};
use know_flow_core::ports::{DatabaseService, PlanFilter, PortError, PortResult, StoreCounts};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn lessons_for(&self, plan_ids: &[Uuid]) -> PortResult<HashMap<Uuid, Vec<Lesson>>> {
        let records = sqlx::query_as::<_, LessonRecord>(&format!(
            "SELECT {} FROM lessons WHERE plan_id = ANY($1) ORDER BY plan_id, lesson_order",
            LESSON_COLUMNS
        ))
        .bind(plan_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut grouped: HashMap<Uuid, Vec<Lesson>> = HashMap::new();
        for record in records {
            grouped
                .entry(record.plan_id)
                .or_default()
                .push(record.to_domain());
        }
        Ok(grouped)
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Unique violations on insert mean the caller reused an id; anything else is unexpected.
fn insert_failed(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Validation(format!("{} already exists", what))
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn to_i32(value: u32, field: &str) -> PortResult<i32> {
    i32::try_from(value)
        .map_err(|_| PortError::Validation(format!("{} {} is out of range", field, value)))
}

fn not_found(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str =
    "uid, email, display_name, learning_style, difficulty, time_availability, current_goal, created_at";
const PLAN_COLUMNS: &str = "id, user_id, title, description, status, progress, difficulty, \
     estimated_duration, topics, ai_generated, quality_score, source_prompt, created_at, last_accessed";
const LESSON_COLUMNS: &str = "id, plan_id, title, objectives, content, external_resources, \
     lesson_order, estimated_minutes, difficulty, completed, mastery_level, completed_at";
const SESSION_COLUMNS: &str = "id, user_id, plan_id, started_at, ended_at, concepts";
const CONCEPT_COLUMNS: &str = "id, user_id, plan_id, name, description, mastery_level, \
     last_reviewed, next_review, source_lesson_id";
const EDGE_COLUMNS: &str = "id, user_id, plan_id, source_concept_id, target_concept_id, relation";

#[derive(FromRow)]
struct UserRecord {
    uid: String,
    email: String,
    display_name: String,
    learning_style: String,
    difficulty: String,
    time_availability: i32,
    current_goal: Option<Uuid>,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            uid: self.uid,
            email: self.email,
            display_name: self.display_name,
            preferences: LearningPreferences {
                learning_style: self.learning_style.parse().unwrap_or_default(),
                difficulty: self.difficulty.parse().unwrap_or_default(),
                time_availability: self.time_availability.max(0) as u32,
            },
            current_goal: self.current_goal,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    uid: String,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct PlanRecord {
    id: Uuid,
    user_id: String,
    title: String,
    description: String,
    status: String,
    progress: i16,
    difficulty: String,
    estimated_duration: String,
    topics: Vec<String>,
    ai_generated: bool,
    quality_score: f64,
    source_prompt: String,
    created_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
}
impl PlanRecord {
    fn to_domain(self, lessons: Vec<Lesson>) -> LearningPlan {
        LearningPlan {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            status: self.status.parse().unwrap_or_default(),
            lessons,
            progress: self.progress.clamp(0, 100) as u8,
            difficulty: self.difficulty.parse().unwrap_or_default(),
            estimated_duration: self.estimated_duration,
            topics: self.topics,
            ai_generated: self.ai_generated,
            quality_score: self.quality_score,
            source_prompt: self.source_prompt,
            created_at: self.created_at,
            last_accessed: self.last_accessed,
        }
    }
}

#[derive(FromRow)]
struct LessonRecord {
    id: Uuid,
    plan_id: Uuid,
    title: String,
    objectives: Vec<String>,
    content: String,
    external_resources: Vec<String>,
    lesson_order: i32,
    estimated_minutes: i32,
    difficulty: String,
    completed: bool,
    mastery_level: i16,
    completed_at: Option<DateTime<Utc>>,
}
impl LessonRecord {
    fn to_domain(self) -> Lesson {
        Lesson {
            id: self.id,
            plan_id: self.plan_id,
            title: self.title,
            objectives: self.objectives,
            content: self.content,
            external_resources: self.external_resources,
            order: self.lesson_order.max(0) as u32,
            estimated_minutes: self.estimated_minutes.max(0) as u32,
            difficulty: self.difficulty.parse().unwrap_or_default(),
            completed: self.completed,
            mastery_level: self.mastery_level.clamp(0, 100) as u8,
            completed_at: self.completed_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    user_id: String,
    plan_id: Uuid,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    concepts: Vec<String>,
}
impl SessionRecord {
    fn to_domain(self) -> StudySession {
        StudySession {
            id: self.id,
            user_id: self.user_id,
            plan_id: self.plan_id,
            started_at: self.started_at,
            ended_at: self.ended_at,
            concepts: self.concepts,
        }
    }
}

#[derive(FromRow)]
struct ConceptRecord {
    id: Uuid,
    user_id: String,
    plan_id: Uuid,
    name: String,
    description: String,
    mastery_level: i16,
    last_reviewed: Option<DateTime<Utc>>,
    next_review: Option<DateTime<Utc>>,
    source_lesson_id: Option<Uuid>,
}
impl ConceptRecord {
    fn to_domain(self) -> ConceptNode {
        ConceptNode {
            id: self.id,
            user_id: self.user_id,
            plan_id: self.plan_id,
            name: self.name,
            description: self.description,
            mastery_level: self.mastery_level.clamp(0, 100) as u8,
            last_reviewed: self.last_reviewed,
            next_review: self.next_review,
            source_lesson_id: self.source_lesson_id,
        }
    }
}

#[derive(FromRow)]
struct EdgeRecord {
    id: Uuid,
    user_id: String,
    plan_id: Uuid,
    source_concept_id: Uuid,
    target_concept_id: Uuid,
    relation: String,
}
impl EdgeRecord {
    /// Edges with an unknown relation are skipped.
    fn to_domain(self) -> Option<ConceptEdge> {
        Some(ConceptEdge {
            id: self.id,
            user_id: self.user_id,
            plan_id: self.plan_id,
            source_concept_id: self.source_concept_id,
            target_concept_id: self.target_concept_id,
            relation: self.relation.parse().ok()?,
        })
    }
}

#[derive(FromRow)]
struct CountsRecord {
    users: i64,
    plans: i64,
    lessons: i64,
    sessions: i64,
    prompts: i64,
}

async fn insert_plan(tx: &mut Transaction<'_, Postgres>, plan: &LearningPlan) -> PortResult<()> {
    sqlx::query(&format!(
        "INSERT INTO learning_plans ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        PLAN_COLUMNS
    ))
    .bind(plan.id)
    .bind(&plan.user_id)
    .bind(&plan.title)
    .bind(&plan.description)
    .bind(plan.status.as_str())
    .bind(plan.progress as i16)
    .bind(plan.difficulty.as_str())
    .bind(&plan.estimated_duration)
    .bind(&plan.topics)
    .bind(plan.ai_generated)
    .bind(plan.quality_score)
    .bind(&plan.source_prompt)
    .bind(plan.created_at)
    .bind(plan.last_accessed)
    .execute(&mut **tx)
    .await
    .map_err(insert_failed(format!("Plan {}", plan.id)))?;

    for lesson in &plan.lessons {
        let order = to_i32(lesson.order, "Lesson order")?;
        let minutes = to_i32(lesson.estimated_minutes, "Lesson estimate")?;
        sqlx::query(&format!(
            "INSERT INTO lessons ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            LESSON_COLUMNS
        ))
        .bind(lesson.id)
        .bind(plan.id)
        .bind(&lesson.title)
        .bind(&lesson.objectives)
        .bind(&lesson.content)
        .bind(&lesson.external_resources)
        .bind(order)
        .bind(minutes)
        .bind(lesson.difficulty.as_str())
        .bind(lesson.completed)
        .bind(lesson.mastery_level as i16)
        .bind(lesson.completed_at)
        .execute(&mut **tx)
        .await
        .map_err(insert_failed(format!("Lesson {}", lesson.id)))?;
    }
    Ok(())
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (uid, email, hashed_password, display_name) VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(email)
        .bind(hashed_password)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Validation(format!("An account for {} already exists", email))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, uid: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE uid = $1",
            USER_COLUMNS
        ))
        .bind(uid)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User {} not found", uid)))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT uid, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("No user with email {}", email)))?;
        Ok(UserCredentials {
            uid: record.uid,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn update_user_profile(&self, user: &User) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE users SET learning_style = $1, difficulty = $2, time_availability = $3, current_goal = $4 WHERE uid = $5",
        )
        .bind(user.preferences.learning_style.as_str())
        .bind(user.preferences.difficulty.as_str())
        .bind(user.preferences.time_availability as i32)
        .bind(user.current_goal)
        .bind(&user.uid)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user.uid)));
        }
        Ok(())
    }

    async fn record_prompt(&self, prompt: &PromptRecord) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO prompts (id, user_id, prompt, status, plan_id, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(prompt.id)
        .bind(&prompt.user_id)
        .bind(&prompt.prompt)
        .bind(prompt.status.as_str())
        .bind(prompt.plan_id)
        .bind(prompt.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn update_prompt_status(
        &self,
        prompt_id: Uuid,
        status: PromptStatus,
        plan_id: Option<Uuid>,
    ) -> PortResult<()> {
        sqlx::query("UPDATE prompts SET status = $1, plan_id = COALESCE($2, plan_id) WHERE id = $3")
            .bind(status.as_str())
            .bind(plan_id)
            .bind(prompt_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn save_plans(&self, plans: &[LearningPlan]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for plan in plans {
            insert_plan(&mut tx, plan).await?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn get_plan(&self, plan_id: Uuid) -> PortResult<LearningPlan> {
        let record = sqlx::query_as::<_, PlanRecord>(&format!(
            "SELECT {} FROM learning_plans WHERE id = $1",
            PLAN_COLUMNS
        ))
        .bind(plan_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Plan {} not found", plan_id)))?;

        let mut lessons = self.lessons_for(&[plan_id]).await?;
        Ok(record.to_domain(lessons.remove(&plan_id).unwrap_or_default()))
    }

    async fn list_plans(
        &self,
        user_id: &str,
        filter: &PlanFilter,
    ) -> PortResult<(Vec<LearningPlan>, usize)> {
        const WHERE: &str = "user_id = $1 \
             AND ($2::text IS NULL OR status = $2) \
             AND ($3::text IS NULL OR difficulty = $3) \
             AND (cardinality($4::text[]) = 0 OR EXISTS (SELECT 1 FROM unnest(topics) t WHERE lower(t) = ANY($4)))";
        let status = filter.status.map(|s| s.as_str());
        let difficulty = filter.difficulty.map(|d| d.as_str());
        let topics: Vec<String> = filter.topics.iter().map(|t| t.to_lowercase()).collect();

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM learning_plans WHERE {}",
            WHERE
        ))
        .bind(user_id)
        .bind(status)
        .bind(difficulty)
        .bind(&topics)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        let records = sqlx::query_as::<_, PlanRecord>(&format!(
            "SELECT {} FROM learning_plans WHERE {} ORDER BY created_at DESC LIMIT $5 OFFSET $6",
            PLAN_COLUMNS, WHERE
        ))
        .bind(user_id)
        .bind(status)
        .bind(difficulty)
        .bind(&topics)
        .bind(filter.limit.map(|l| l as i64))
        .bind(filter.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let mut lessons = self.lessons_for(&ids).await?;
        let plans = records
            .into_iter()
            .map(|r| {
                let plan_lessons = lessons.remove(&r.id).unwrap_or_default();
                r.to_domain(plan_lessons)
            })
            .collect();
        Ok((plans, total.max(0) as usize))
    }

    async fn update_plan(&self, plan: &LearningPlan) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let result = sqlx::query(
            "UPDATE learning_plans SET status = $1, progress = $2, last_accessed = $3 WHERE id = $4",
        )
        .bind(plan.status.as_str())
        .bind(plan.progress as i16)
        .bind(plan.last_accessed)
        .bind(plan.id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Plan {} not found", plan.id)));
        }

        for lesson in &plan.lessons {
            sqlx::query(
                "UPDATE lessons SET completed = $1, mastery_level = $2, completed_at = $3 WHERE id = $4 AND plan_id = $5",
            )
            .bind(lesson.completed)
            .bind(lesson.mastery_level as i16)
            .bind(lesson.completed_at)
            .bind(lesson.id)
            .bind(plan.id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn touch_plan(&self, plan_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        let result = sqlx::query("UPDATE learning_plans SET last_accessed = $1 WHERE id = $2")
            .bind(at)
            .bind(plan_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Plan {} not found", plan_id)));
        }
        Ok(())
    }

    async fn delete_plan(&self, plan_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM learning_plans WHERE id = $1")
            .bind(plan_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Plan {} not found", plan_id)));
        }
        Ok(())
    }

    async fn save_knowledge_graph(&self, graph: &KnowledgeGraph) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for node in &graph.nodes {
            sqlx::query(&format!(
                "INSERT INTO concepts ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                CONCEPT_COLUMNS
            ))
            .bind(node.id)
            .bind(&node.user_id)
            .bind(node.plan_id)
            .bind(&node.name)
            .bind(&node.description)
            .bind(node.mastery_level as i16)
            .bind(node.last_reviewed)
            .bind(node.next_review)
            .bind(node.source_lesson_id)
            .execute(&mut *tx)
            .await
            .map_err(insert_failed(format!("Concept {}", node.id)))?;
        }
        for edge in &graph.edges {
            sqlx::query(&format!(
                "INSERT INTO concept_edges ({}) VALUES ($1, $2, $3, $4, $5, $6)",
                EDGE_COLUMNS
            ))
            .bind(edge.id)
            .bind(&edge.user_id)
            .bind(edge.plan_id)
            .bind(edge.source_concept_id)
            .bind(edge.target_concept_id)
            .bind(edge.relation.as_str())
            .execute(&mut *tx)
            .await
            .map_err(insert_failed(format!("Edge {}", edge.id)))?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn knowledge_graph(
        &self,
        user_id: &str,
        plan_id: Option<Uuid>,
    ) -> PortResult<KnowledgeGraph> {
        const WHERE: &str = "user_id = $1 AND ($2::uuid IS NULL OR plan_id = $2)";
        let nodes = sqlx::query_as::<_, ConceptRecord>(&format!(
            "SELECT {} FROM concepts WHERE {} ORDER BY plan_id, name",
            CONCEPT_COLUMNS, WHERE
        ))
        .bind(user_id)
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        let edges = sqlx::query_as::<_, EdgeRecord>(&format!(
            "SELECT {} FROM concept_edges WHERE {}",
            EDGE_COLUMNS, WHERE
        ))
        .bind(user_id)
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(KnowledgeGraph {
            nodes: nodes.into_iter().map(|r| r.to_domain()).collect(),
            edges: edges.into_iter().filter_map(|r| r.to_domain()).collect(),
        })
    }

    async fn review_concepts(
        &self,
        lesson_id: Uuid,
        mastery: u8,
        at: DateTime<Utc>,
    ) -> PortResult<()> {
        let next_review = at + review_interval(mastery);
        sqlx::query(
            "UPDATE concepts SET mastery_level = $1, last_reviewed = $2, next_review = $3 WHERE source_lesson_id = $4",
        )
        .bind(mastery.min(100) as i16)
        .bind(at)
        .bind(next_review)
        .bind(lesson_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn create_study_session(&self, session: &StudySession) -> PortResult<()> {
        sqlx::query(&format!(
            "INSERT INTO study_sessions ({}) VALUES ($1, $2, $3, $4, $5, $6)",
            SESSION_COLUMNS
        ))
        .bind(session.id)
        .bind(&session.user_id)
        .bind(session.plan_id)
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(&session.concepts)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_study_session(&self, session_id: Uuid) -> PortResult<StudySession> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM study_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Session {} not found", session_id)))?;
        Ok(record.to_domain())
    }

    async fn update_study_session(&self, session: &StudySession) -> PortResult<()> {
        let result =
            sqlx::query("UPDATE study_sessions SET ended_at = $1, concepts = $2 WHERE id = $3")
                .bind(session.ended_at)
                .bind(&session.concepts)
                .bind(session.id)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Session {} not found",
                session.id
            )));
        }
        Ok(())
    }

    async fn list_study_sessions(&self, user_id: &str) -> PortResult<Vec<StudySession>> {
        let records = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM study_sessions WHERE user_id = $1 ORDER BY started_at ASC",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn ping(&self) -> PortResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn counts(&self) -> PortResult<StoreCounts> {
        let record = sqlx::query_as::<_, CountsRecord>(
            "SELECT \
                (SELECT COUNT(*) FROM users) AS users, \
                (SELECT COUNT(*) FROM learning_plans) AS plans, \
                (SELECT COUNT(*) FROM lessons) AS lessons, \
                (SELECT COUNT(*) FROM study_sessions) AS sessions, \
                (SELECT COUNT(*) FROM prompts) AS prompts",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(StoreCounts {
            users: record.users.max(0) as u64,
            plans: record.plans.max(0) as u64,
            lessons: record.lessons.max(0) as u64,
            sessions: record.sessions.max(0) as u64,
            prompts: record.prompts.max(0) as u64,
        })
    }
}
