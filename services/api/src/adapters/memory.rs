//! services/api/src/adapters/memory.rs
//!
//! A process-local `DatabaseService` used when no `DATABASE_URL` is configured,
//! and by the integration tests. Everything is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use know_flow_core::domain::{
    LearningPlan, LearningPreferences, PromptRecord, PromptStatus, StudySession, User,
    UserCredentials,
};
use know_flow_core::knowledge::KnowledgeGraph;
use know_flow_core::ports::{DatabaseService, PlanFilter, PortError, PortResult, StoreCounts};
use tokio::sync::RwLock;
use uuid::Uuid;

struct StoredUser {
    user: User,
    hashed_password: String,
}

#[derive(Default)]
struct Tables {
    users: HashMap<String, StoredUser>,
    plans: HashMap<Uuid, LearningPlan>,
    sessions: HashMap<Uuid, StudySession>,
    prompts: HashMap<Uuid, PromptRecord>,
    graph: KnowledgeGraph,
}

#[derive(Default)]
pub struct MemoryAdapter {
    tables: RwLock<Tables>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatabaseService for MemoryAdapter {
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
    ) -> PortResult<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.user.email.eq_ignore_ascii_case(email))
        {
            return Err(PortError::Validation(format!(
                "An account for {} already exists",
                email
            )));
        }
        let user = User {
            uid: Uuid::new_v4().to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            preferences: LearningPreferences::default(),
            current_goal: None,
            created_at: Utc::now(),
        };
        tables.users.insert(
            user.uid.clone(),
            StoredUser {
                user: user.clone(),
                hashed_password: hashed_password.to_string(),
            },
        );
        Ok(user)
    }

    async fn get_user(&self, uid: &str) -> PortResult<User> {
        self.tables
            .read()
            .await
            .users
            .get(uid)
            .map(|u| u.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", uid)))
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.user.email.eq_ignore_ascii_case(email))
            .map(|u| UserCredentials {
                uid: u.user.uid.clone(),
                email: u.user.email.clone(),
                hashed_password: u.hashed_password.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("No user with email {}", email)))
    }

    async fn update_user_profile(&self, user: &User) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .users
            .get_mut(&user.uid)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user.uid)))?;
        stored.user.preferences = user.preferences.clone();
        stored.user.current_goal = user.current_goal;
        Ok(())
    }

    async fn record_prompt(&self, prompt: &PromptRecord) -> PortResult<()> {
        self.tables
            .write()
            .await
            .prompts
            .insert(prompt.id, prompt.clone());
        Ok(())
    }

    async fn update_prompt_status(
        &self,
        prompt_id: Uuid,
        status: PromptStatus,
        plan_id: Option<Uuid>,
    ) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(prompt) = tables.prompts.get_mut(&prompt_id) {
            prompt.status = status;
            if plan_id.is_some() {
                prompt.plan_id = plan_id;
            }
        }
        Ok(())
    }

    async fn save_plans(&self, plans: &[LearningPlan]) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        // Validate the whole batch before touching the table.
        for plan in plans {
            if tables.plans.contains_key(&plan.id) {
                return Err(PortError::Validation(format!(
                    "Plan {} already exists",
                    plan.id
                )));
            }
            if !tables.users.contains_key(&plan.user_id) {
                return Err(PortError::NotFound(format!(
                    "User {} not found",
                    plan.user_id
                )));
            }
        }
        for plan in plans {
            tables.plans.insert(plan.id, plan.clone());
        }
        Ok(())
    }

    async fn get_plan(&self, plan_id: Uuid) -> PortResult<LearningPlan> {
        self.tables
            .read()
            .await
            .plans
            .get(&plan_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Plan {} not found", plan_id)))
    }

    async fn list_plans(
        &self,
        user_id: &str,
        filter: &PlanFilter,
    ) -> PortResult<(Vec<LearningPlan>, usize)> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&LearningPlan> = tables
            .plans
            .values()
            .filter(|p| p.user_id == user_id && filter.matches(p))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn update_plan(&self, plan: &LearningPlan) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .plans
            .get_mut(&plan.id)
            .ok_or_else(|| PortError::NotFound(format!("Plan {} not found", plan.id)))?;
        stored.status = plan.status;
        stored.progress = plan.progress;
        stored.last_accessed = plan.last_accessed;
        for lesson in &plan.lessons {
            if let Some(target) = stored.lessons.iter_mut().find(|l| l.id == lesson.id) {
                target.completed = lesson.completed;
                target.mastery_level = lesson.mastery_level;
                target.completed_at = lesson.completed_at;
            }
        }
        Ok(())
    }

    async fn touch_plan(&self, plan_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .plans
            .get_mut(&plan_id)
            .ok_or_else(|| PortError::NotFound(format!("Plan {} not found", plan_id)))?;
        stored.last_accessed = at;
        Ok(())
    }

    async fn delete_plan(&self, plan_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .plans
            .remove(&plan_id)
            .ok_or_else(|| PortError::NotFound(format!("Plan {} not found", plan_id)))?;
        tables.graph.nodes.retain(|n| n.plan_id != plan_id);
        tables.graph.edges.retain(|e| e.plan_id != plan_id);
        Ok(())
    }

    async fn save_knowledge_graph(&self, graph: &KnowledgeGraph) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        for node in &graph.nodes {
            if !tables.plans.contains_key(&node.plan_id) {
                return Err(PortError::NotFound(format!("Plan {} not found", node.plan_id)));
            }
            if tables.graph.nodes.iter().any(|n| n.id == node.id) {
                return Err(PortError::Validation(format!("Concept {} already exists", node.id)));
            }
        }
        tables.graph.nodes.extend(graph.nodes.iter().cloned());
        tables.graph.edges.extend(graph.edges.iter().cloned());
        Ok(())
    }

    async fn knowledge_graph(
        &self,
        user_id: &str,
        plan_id: Option<Uuid>,
    ) -> PortResult<KnowledgeGraph> {
        let tables = self.tables.read().await;
        let wanted =
            |owner: &str, plan: Uuid| owner == user_id && plan_id.map_or(true, |p| p == plan);
        let mut nodes: Vec<_> = tables
            .graph
            .nodes
            .iter()
            .filter(|n| wanted(n.user_id.as_str(), n.plan_id))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.plan_id.cmp(&b.plan_id).then_with(|| a.name.cmp(&b.name)));
        let edges = tables
            .graph
            .edges
            .iter()
            .filter(|e| wanted(e.user_id.as_str(), e.plan_id))
            .cloned()
            .collect();
        Ok(KnowledgeGraph { nodes, edges })
    }

    async fn review_concepts(
        &self,
        lesson_id: Uuid,
        mastery: u8,
        at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        for node in tables
            .graph
            .nodes
            .iter_mut()
            .filter(|n| n.source_lesson_id == Some(lesson_id))
        {
            node.review(mastery as i64, at);
        }
        Ok(())
    }

    async fn create_study_session(&self, session: &StudySession) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if tables.sessions.contains_key(&session.id) {
            return Err(PortError::Unexpected(format!(
                "Session {} already exists",
                session.id
            )));
        }
        tables.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_study_session(&self, session_id: Uuid) -> PortResult<StudySession> {
        self.tables
            .read()
            .await
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))
    }

    async fn update_study_session(&self, session: &StudySession) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .sessions
            .get_mut(&session.id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session.id)))?;
        stored.ended_at = session.ended_at;
        stored.concepts = session.concepts.clone();
        Ok(())
    }

    async fn list_study_sessions(&self, user_id: &str) -> PortResult<Vec<StudySession>> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<StudySession> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }

    async fn ping(&self) -> PortResult<()> {
        Ok(())
    }

    async fn counts(&self) -> PortResult<StoreCounts> {
        let tables = self.tables.read().await;
        Ok(StoreCounts {
            users: tables.users.len() as u64,
            plans: tables.plans.len() as u64,
            lessons: tables.plans.values().map(|p| p.lessons.len() as u64).sum(),
            sessions: tables.sessions.len() as u64,
            prompts: tables.prompts.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use know_flow_core::domain::{Difficulty, GeneratedLesson, GeneratedPlan, PlanStatus};

    fn generated(title: &str) -> GeneratedPlan {
        GeneratedPlan {
            title: title.to_string(),
            description: String::new(),
            difficulty: Difficulty::Beginner,
            estimated_duration: "1 hour".into(),
            topics: vec!["python".into()],
            quality_score: 0.8,
            lessons: vec![GeneratedLesson {
                title: "Intro".into(),
                objectives: vec![],
                content: String::new(),
                external_resources: vec![],
                estimated_minutes: 20,
                difficulty: None,
            }],
            concepts: vec![],
            relations: vec![],
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryAdapter::new();
        store.create_user("a@b.c", "hash", "A").await.unwrap();
        let err = store.create_user("A@B.C", "hash", "A").await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }

    #[tokio::test]
    async fn batch_with_duplicate_id_stores_nothing() {
        let store = MemoryAdapter::new();
        let user = store.create_user("a@b.c", "hash", "A").await.unwrap();
        let now = Utc::now();
        let first = LearningPlan::from_generated(&user.uid, "p", generated("One"), now);
        store.save_plan(&first).await.unwrap();

        let second = LearningPlan::from_generated(&user.uid, "p", generated("Two"), now);
        let err = store.save_plans(&[second.clone(), first.clone()]).await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
        assert!(store.get_plan(second.id).await.is_err());
    }

    #[tokio::test]
    async fn touching_a_plan_keeps_lesson_progress() {
        let store = MemoryAdapter::new();
        let user = store.create_user("a@b.c", "hash", "A").await.unwrap();
        let now = Utc::now();
        let plan = LearningPlan::from_generated(&user.uid, "p", generated("One"), now);
        store.save_plan(&plan).await.unwrap();

        // A reader loads the plan, then progress is written before it touches it.
        let stale = store.get_plan(plan.id).await.unwrap();
        let mut fresh = stale.clone();
        let lesson_id = fresh.lessons[0].id;
        let lesson = fresh.lesson_mut(lesson_id).unwrap();
        lesson.set_completed(true, now);
        lesson.set_mastery(80);
        fresh.recompute_progress();
        store.update_plan(&fresh).await.unwrap();

        let later = now + Duration::minutes(5);
        store.touch_plan(stale.id, later).await.unwrap();

        let stored = store.get_plan(plan.id).await.unwrap();
        assert_eq!(stored.last_accessed, later);
        assert!(stored.lessons[0].completed);
        assert_eq!(stored.lessons[0].mastery_level, 80);
        assert_eq!(stored.progress, 100);
        assert!(matches!(
            store.touch_plan(Uuid::new_v4(), later).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn knowledge_graph_follows_reviews_and_plan_deletion() {
        let store = MemoryAdapter::new();
        let user = store.create_user("a@b.c", "hash", "A").await.unwrap();
        let now = Utc::now();
        let (plan, graph) =
            LearningPlan::from_generated_with_graph(&user.uid, "p", generated("One"), now);
        store.save_plan(&plan).await.unwrap();
        store.save_knowledge_graph(&graph).await.unwrap();
        assert!(store.save_knowledge_graph(&graph).await.is_err());

        store.review_concepts(plan.lessons[0].id, 85, now).await.unwrap();
        let stored = store.knowledge_graph(&user.uid, Some(plan.id)).await.unwrap();
        assert_eq!(stored.nodes.len(), 1);
        assert_eq!(stored.nodes[0].mastery_level, 85);
        assert_eq!(stored.nodes[0].next_review, Some(now + Duration::days(7)));
        assert!(store.knowledge_graph("someone-else", None).await.unwrap().nodes.is_empty());

        store.delete_plan(plan.id).await.unwrap();
        assert!(store.knowledge_graph(&user.uid, None).await.unwrap().nodes.is_empty());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paginated() {
        let store = MemoryAdapter::new();
        let user = store.create_user("a@b.c", "hash", "A").await.unwrap();
        let now = Utc::now();
        let mut ids = Vec::new();
        for i in 0..3 {
            let plan = LearningPlan::from_generated(
                &user.uid,
                "p",
                generated(&format!("Plan {}", i)),
                now + Duration::seconds(i),
            );
            ids.push(plan.id);
            store.save_plan(&plan).await.unwrap();
        }

        let filter = PlanFilter {
            limit: Some(2),
            ..Default::default()
        };
        let (page, total) = store.list_plans(&user.uid, &filter).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, ids[2]);

        let archived = PlanFilter {
            status: Some(PlanStatus::Archived),
            ..Default::default()
        };
        let (page, total) = store.list_plans(&user.uid, &archived).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(total, 0);
    }
}
