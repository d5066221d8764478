//! End-to-end flows: the real router over the in-memory store, a stub plan generator,
//! driven through the `know_flow_client` crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use api_lib::adapters::MemoryAdapter;
use api_lib::config::Config;
use api_lib::web::{build_router, state::AppState};
use async_trait::async_trait;
use know_flow_client::{ApiClient, ClientConfig, ClientError, RequestOptions, ResponseHandler};
use know_flow_core::analytics::Timeframe;
use know_flow_core::domain::{
    Difficulty, GeneratedLesson, GeneratedPlan, LearningContext, LearningStyle, PlanStatus,
    MAX_LESSON_MINUTES,
};
use know_flow_core::knowledge::{ConceptRelation, GeneratedConcept, GeneratedRelation};
use know_flow_core::ports::{PlanGenerationService, PlanRequest, PortError, PortResult};
use know_flow_core::protocol::{
    BatchPlanItem, PlanListOptions, PlanPage, SearchOptions, SignupRequest,
    UpdatePreferencesRequest, UpdateProgressRequest, UserImport,
};
use uuid::Uuid;

/// Produces a two-lesson plan, or fails when the prompt mentions "fail".
///
/// "marathon" asks for absurdly long lessons; "concepts" adds a generated
/// knowledge graph instead of the one derived from lessons.
#[derive(Default)]
struct StubPlanner {
    calls: AtomicUsize,
}

#[async_trait]
impl PlanGenerationService for StubPlanner {
    async fn generate_plan(&self, request: &PlanRequest) -> PortResult<GeneratedPlan> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.prompt.contains("fail") {
            return Err(PortError::Upstream("AI service error: stub refused".into()));
        }
        let difficulty = request.context.difficulty.unwrap_or_default();
        let lesson = |title: &str| GeneratedLesson {
            title: title.to_string(),
            objectives: vec![format!("Understand {}", title.to_lowercase())],
            content: format!("{} explained for {}", title, request.prompt),
            external_resources: vec![],
            estimated_minutes: if request.prompt.contains("marathon") {
                u32::MAX
            } else {
                30
            },
            difficulty: None,
        };
        let (concepts, relations) = if request.prompt.contains("concepts") {
            let concept = |name: &str, lesson: usize| GeneratedConcept {
                name: name.to_string(),
                description: String::new(),
                lesson: Some(lesson),
            };
            (
                vec![concept("Names", 0), concept("Iteration", 1), concept("Ranges", 1)],
                vec![
                    GeneratedRelation {
                        source: "names".into(),
                        target: "Iteration".into(),
                        relation: ConceptRelation::PrerequisiteFor,
                    },
                    GeneratedRelation {
                        source: "Ranges".into(),
                        target: "Iteration".into(),
                        relation: ConceptRelation::PartOf,
                    },
                ],
            )
        } else {
            (vec![], vec![])
        };
        Ok(GeneratedPlan {
            title: format!("Plan: {}", request.prompt),
            description: format!("A plan for {}", request.prompt),
            difficulty,
            estimated_duration: "60 minutes".into(),
            topics: vec!["python".into()],
            quality_score: 0.8,
            lessons: vec![lesson("Variables"), lesson("Loops")],
            concepts,
            relations,
        })
    }
}

struct TestApp {
    base_url: String,
    planner: Arc<StubPlanner>,
}

impl TestApp {
    async fn spawn() -> Self {
        let planner = Arc::new(StubPlanner::default());
        let state = Arc::new(AppState::new(
            Arc::new(MemoryAdapter::new()),
            planner.clone(),
            Arc::new(Config::default()),
            "memory",
        ));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });
        Self {
            base_url: format!("http://{}", addr),
            planner,
        }
    }

    fn anonymous(&self) -> ApiClient {
        ApiClient::new(
            ClientConfig::new(&self.base_url)
                .with_timeout(Duration::from_secs(5))
                .with_retries(0, Duration::from_millis(10)),
        )
        .unwrap()
    }

    /// Signs a new user up and returns a client authenticated as them.
    async fn user(&self, email: &str) -> (ApiClient, String) {
        let auth = self
            .anonymous()
            .signup(&SignupRequest {
                email: email.to_string(),
                password: "correct horse".to_string(),
                display_name: None,
            })
            .await
            .unwrap();
        (self.anonymous().with_identity(auth.uid.clone()), auth.uid)
    }
}

#[tokio::test]
async fn signup_login_and_bearer_checks() {
    let app = TestApp::spawn().await;
    let (alice, alice_uid) = app.user("Alice@Example.com").await;

    let login = app
        .anonymous()
        .login("alice@example.com", "correct horse")
        .await
        .unwrap();
    assert_eq!(login.uid, alice_uid);
    assert_eq!(login.display_name, "alice");

    let err = app
        .anonymous()
        .login("alice@example.com", "wrong password")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized { .. }));
    assert_eq!(err.to_string(), "Invalid email or password");

    let duplicate = app
        .anonymous()
        .signup(&SignupRequest {
            email: "alice@example.com".into(),
            password: "another password".into(),
            display_name: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(duplicate, ClientError::Validation { .. }));

    let missing = app.anonymous().get_user(&alice_uid).await.unwrap_err();
    assert_eq!(missing.to_string(), "Authentication required");

    let forged = app.anonymous().with_identity("no-such-user");
    let err = forged.get_user("no-such-user").await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized { .. }));
    assert_eq!(err.to_string(), "Invalid credentials");

    let profile = alice.get_user(&alice_uid).await.unwrap();
    assert_eq!(profile.email, "alice@example.com");
}

#[tokio::test]
async fn other_users_resources_are_forbidden() {
    let app = TestApp::spawn().await;
    let (alice, alice_uid) = app.user("alice@example.com").await;
    let (bob, _) = app.user("bob@example.com").await;

    let plan = alice
        .generate_learning_plan(&alice_uid, "Learn Python", &LearningContext::default())
        .await
        .unwrap();
    let plan_id: Uuid = plan.id.parse().unwrap();

    let err = bob.get_plan(plan_id).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized { .. }));
    assert_eq!(err.to_string(), "You do not have access to this resource");

    assert!(bob.get_user(&alice_uid).await.is_err());
    assert!(bob
        .list_user_plans(&alice_uid, &PlanListOptions::default())
        .await
        .is_err());
    assert!(bob
        .generate_learning_plan(&alice_uid, "Learn Go", &LearningContext::default())
        .await
        .is_err());

    let missing = alice.get_plan(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(missing.status(), Some(404));
}

#[tokio::test]
async fn generate_then_track_progress() {
    let app = TestApp::spawn().await;
    let (alice, uid) = app.user("alice@example.com").await;

    alice
        .update_preferences(
            &uid,
            &UpdatePreferencesRequest {
                difficulty: Some(Difficulty::Intermediate),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let context = LearningContext {
        learning_style: Some(LearningStyle::Visual),
        ..Default::default()
    };
    let summary = alice
        .generate_learning_plan(&uid, "Learn Python", &context)
        .await
        .unwrap();
    assert_eq!(summary.title, "Plan: Learn Python");
    assert_eq!(summary.lessons.len(), 2);
    // Stored preferences fill in what the request left out.
    assert_eq!(summary.difficulty, Some(Difficulty::Intermediate));

    let plan_id: Uuid = summary.id.parse().unwrap();
    let profile = alice.get_user(&uid).await.unwrap();
    assert_eq!(profile.current_goal, Some(plan_id));

    let page = alice
        .list_user_plans(&uid, &PlanListOptions::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert!(!page.has_more);

    let plan = alice.get_plan(plan_id).await.unwrap();
    let first = plan.lessons[0].id;
    let second = plan.lessons[1].id;

    let session = alice
        .create_session(plan_id, vec!["variables".into()])
        .await
        .unwrap();
    assert!(session.ended_at.is_none());

    let updated = alice
        .update_progress(&UpdateProgressRequest {
            plan_id,
            lesson_id: first,
            completed: true,
            mastery_level: Some(150),
        })
        .await
        .unwrap();
    assert_eq!(updated.progress, 50);
    assert_eq!(updated.lessons[0].mastery_level, 100);
    assert_eq!(updated.status, PlanStatus::Active);

    let updated = alice
        .update_progress(&UpdateProgressRequest {
            plan_id,
            lesson_id: second,
            completed: true,
            mastery_level: Some(-20),
        })
        .await
        .unwrap();
    assert_eq!(updated.progress, 100);
    assert_eq!(updated.lessons[1].mastery_level, 0);
    assert_eq!(updated.status, PlanStatus::Completed);

    let unknown_lesson = alice
        .update_progress(&UpdateProgressRequest {
            plan_id,
            lesson_id: Uuid::new_v4(),
            completed: true,
            mastery_level: None,
        })
        .await
        .unwrap_err();
    assert_eq!(unknown_lesson.status(), Some(404));

    let ended = alice.end_session(session.id).await.unwrap();
    assert!(ended.ended_at.is_some());

    let analytics = alice.get_analytics(&uid, Timeframe::Week).await.unwrap();
    assert_eq!(analytics.sessions_count, 1);
    assert_eq!(analytics.lessons_completed, 2);
    assert_eq!(analytics.completed_plans, 1);

    let hits = alice
        .search_content("loops", &SearchOptions::default())
        .await
        .unwrap();
    assert!(hits.iter().any(|h| h.lesson_title.as_deref() == Some("Loops")));

    let blank = alice
        .search_content("  ", &SearchOptions::default())
        .await
        .unwrap_err();
    assert_eq!(blank.to_string(), "Search query is required");

    let completed = alice
        .list_user_plans(
            &uid,
            &PlanListOptions {
                status: Some(PlanStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(completed.total, 1);

    alice.delete_plan(plan_id).await.unwrap();
    assert_eq!(alice.get_user(&uid).await.unwrap().current_goal, None);
}

#[tokio::test]
async fn failed_generation_is_reported_and_batches_are_all_or_nothing() {
    let app = TestApp::spawn().await;
    let (alice, uid) = app.user("alice@example.com").await;

    let err = alice
        .generate_learning_plan(&uid, "please fail", &LearningContext::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(502));
    assert_eq!(err.to_string(), "AI service error: stub refused");

    let batch = vec![
        BatchPlanItem {
            prompt: "Learn Rust".into(),
            context: LearningContext::default(),
        },
        BatchPlanItem {
            prompt: "this one should fail".into(),
            context: LearningContext::default(),
        },
    ];
    assert!(alice.batch_generate_plans(batch).await.is_err());
    let page = alice
        .list_user_plans(&uid, &PlanListOptions::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);

    let empty = alice.batch_generate_plans(vec![]).await.unwrap_err();
    assert!(matches!(empty, ClientError::Validation { .. }));

    let plans = alice
        .batch_generate_plans(vec![
            BatchPlanItem {
                prompt: "Learn Rust".into(),
                context: LearningContext::default(),
            },
            BatchPlanItem {
                prompt: "Learn SQL".into(),
                context: LearningContext::default(),
            },
        ])
        .await
        .unwrap();
    assert_eq!(plans.len(), 2);

    let metrics = alice.system_metrics().await.unwrap();
    assert_eq!(metrics.plans, 2);
    assert_eq!(metrics.plans_generated, 2);
    assert_eq!(metrics.generation_failures, 2);
    assert!(app.planner.calls.load(Ordering::SeqCst) >= 4);
}

#[tokio::test]
async fn legacy_prompt_endpoint_is_not_enveloped() {
    let app = TestApp::spawn().await;
    let (alice, uid) = app.user("alice@example.com").await;

    let response = alice.submit_prompt(&uid, "Learn Haskell").await.unwrap();
    assert!(response.success);
    assert_eq!(response.user_id, uid);
    assert!(response.plan_id.is_some());

    let blank = alice.submit_prompt(&uid, "   ").await.unwrap_err();
    assert!(matches!(blank, ClientError::Validation { .. }));

    let queried = alice.submit_prompt_query(&uid, "Learn Elm").await.unwrap();
    assert!(queried.success);
    assert_eq!(queried.prompt, "Learn Elm");

    let no_user = alice
        .request(
            "/api/user-prompt",
            RequestOptions::get().query("prompt", "Learn Elm"),
        )
        .await
        .unwrap_err();
    assert!(matches!(no_user, ClientError::Validation { .. }));
    assert_eq!(no_user.to_string(), "Missing userId");

    // The singular `/api/user/...` listing is an alias of the plural route.
    let body = alice
        .request(&format!("/api/user/{}/plans", uid), RequestOptions::get())
        .await
        .unwrap();
    let page: PlanPage = ResponseHandler::into_data(body).unwrap();
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn overlong_generated_lessons_are_capped() {
    let app = TestApp::spawn().await;
    let (alice, uid) = app.user("alice@example.com").await;

    let summary = alice
        .generate_learning_plan(&uid, "Run a marathon", &LearningContext::default())
        .await
        .unwrap();
    let plan = alice.get_plan(summary.id.parse().unwrap()).await.unwrap();
    assert!(plan
        .lessons
        .iter()
        .all(|l| l.estimated_minutes == MAX_LESSON_MINUTES));
    assert_eq!(plan.total_estimated_minutes(), 2 * MAX_LESSON_MINUTES);
}

#[tokio::test]
async fn knowledge_graph_follows_lesson_mastery() {
    let app = TestApp::spawn().await;
    let (alice, uid) = app.user("alice@example.com").await;
    let (bob, _) = app.user("bob@example.com").await;

    let summary = alice
        .generate_learning_plan(&uid, "Learn Python", &LearningContext::default())
        .await
        .unwrap();
    let plan_id: Uuid = summary.id.parse().unwrap();
    let plan = alice.get_plan(plan_id).await.unwrap();

    // Without generated concepts each lesson is a concept, chained in order.
    let graph = alice.get_plan_knowledge_graph(plan_id).await.unwrap();
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].relation, ConceptRelation::PrerequisiteFor);
    assert!(graph.due_for_review.is_empty());

    alice
        .update_progress(&UpdateProgressRequest {
            plan_id,
            lesson_id: plan.lessons[0].id,
            completed: true,
            mastery_level: Some(30),
        })
        .await
        .unwrap();
    let graph = alice.get_plan_knowledge_graph(plan_id).await.unwrap();
    let reviewed = graph
        .nodes
        .iter()
        .find(|n| n.source_lesson_id == Some(plan.lessons[0].id))
        .unwrap();
    assert_eq!(reviewed.mastery_level, 30);
    assert!(reviewed.last_reviewed.is_some());
    assert!(reviewed.next_review > reviewed.last_reviewed);

    let generated = alice
        .generate_learning_plan(&uid, "Learn Python concepts", &LearningContext::default())
        .await
        .unwrap();
    let graph = alice
        .get_plan_knowledge_graph(generated.id.parse().unwrap())
        .await
        .unwrap();
    let mut names: Vec<&str> = graph.nodes.iter().map(|n| n.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["Iteration", "Names", "Ranges"]);
    assert_eq!(graph.edges.len(), 2);

    let everything = alice.get_knowledge_graph(&uid).await.unwrap();
    assert_eq!(everything.nodes.len(), 5);

    let err = bob.get_plan_knowledge_graph(plan_id).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized { .. }));
    assert!(bob.get_knowledge_graph(&uid).await.is_err());

    alice.delete_plan(plan_id).await.unwrap();
    assert_eq!(alice.get_knowledge_graph(&uid).await.unwrap().nodes.len(), 3);
}

#[tokio::test]
async fn export_then_import_skips_known_records() {
    let app = TestApp::spawn().await;
    let (alice, alice_uid) = app.user("alice@example.com").await;
    let (bob, bob_uid) = app.user("bob@example.com").await;

    let summary = alice
        .generate_learning_plan(&alice_uid, "Learn Python", &LearningContext::default())
        .await
        .unwrap();
    let plan_id: Uuid = summary.id.parse().unwrap();
    alice.create_session(plan_id, vec![]).await.unwrap();

    let export = alice.export_user_data(&alice_uid).await.unwrap();
    assert_eq!(export.plans.len(), 1);
    assert_eq!(export.sessions.len(), 1);

    // Re-importing an export changes nothing.
    let again = alice
        .import_user_data(&alice_uid, &UserImport::from(export.clone()))
        .await
        .unwrap();
    assert_eq!(again.plans_imported, 0);
    assert_eq!(again.plans_skipped, 1);
    assert_eq!(again.sessions_skipped, 1);

    // A copy under fresh ids lands with Bob; the session still points at Alice's plan.
    let mut copy = UserImport::from(export);
    for plan in &mut copy.plans {
        plan.id = Uuid::new_v4();
        for lesson in &mut plan.lessons {
            lesson.id = Uuid::new_v4();
        }
    }
    let imported = bob.import_user_data(&bob_uid, &copy).await.unwrap();
    assert_eq!(imported.plans_imported, 1);
    assert_eq!(imported.sessions_imported, 0);
    assert_eq!(imported.sessions_skipped, 1);

    let bobs = bob
        .list_user_plans(&bob_uid, &PlanListOptions::default())
        .await
        .unwrap();
    assert_eq!(bobs.total, 1);
    assert_eq!(bobs.plans[0].user_id, bob_uid);
}

#[tokio::test]
async fn import_cannot_take_over_another_users_plan() {
    let app = TestApp::spawn().await;
    let (alice, alice_uid) = app.user("alice@example.com").await;
    let (bob, bob_uid) = app.user("bob@example.com").await;

    let summary = alice
        .generate_learning_plan(&alice_uid, "Learn Python", &LearningContext::default())
        .await
        .unwrap();
    let plan_id: Uuid = summary.id.parse().unwrap();

    let mut stolen = UserImport::from(alice.export_user_data(&alice_uid).await.unwrap());
    stolen.plans[0].title = "Bob's now".into();
    let result = bob.import_user_data(&bob_uid, &stolen).await.unwrap();
    assert_eq!(result.plans_imported, 0);
    assert_eq!(result.plans_skipped, 1);

    let original = alice.get_plan(plan_id).await.unwrap();
    assert_eq!(original.user_id, alice_uid);
    assert_eq!(original.title, "Plan: Learn Python");
    let bobs = bob
        .list_user_plans(&bob_uid, &PlanListOptions::default())
        .await
        .unwrap();
    assert_eq!(bobs.total, 0);
}

#[tokio::test]
async fn imported_scores_are_clamped_into_range() {
    let app = TestApp::spawn().await;
    let (alice, uid) = app.user("alice@example.com").await;

    let summary = alice
        .generate_learning_plan(&uid, "Learn Python", &LearningContext::default())
        .await
        .unwrap();
    let plan_id: Uuid = summary.id.parse().unwrap();
    let mut data = UserImport::from(alice.export_user_data(&uid).await.unwrap());
    alice.delete_plan(plan_id).await.unwrap();

    let plan = &mut data.plans[0];
    plan.quality_score = 42.0;
    plan.lessons[0].completed = true;
    plan.lessons[0].mastery_level = 250;
    plan.lessons[1].estimated_minutes = u32::MAX;
    let result = alice.import_user_data(&uid, &data).await.unwrap();
    assert_eq!(result.plans_imported, 1);

    let stored = alice.get_plan(plan_id).await.unwrap();
    assert_eq!(stored.quality_score, 1.0);
    assert_eq!(stored.lessons[0].mastery_level, 100);
    assert_eq!(stored.lessons[1].estimated_minutes, MAX_LESSON_MINUTES);
    assert_eq!(stored.progress, 50);

    let analytics = alice.get_analytics(&uid, Timeframe::Week).await.unwrap();
    assert!(analytics.average_mastery <= 100);

    let graph = alice.get_plan_knowledge_graph(plan_id).await.unwrap();
    assert_eq!(graph.nodes.len(), 2);
    assert!(graph.nodes.iter().any(|n| n.mastery_level == 100));
}

#[tokio::test]
async fn health_and_system_status() {
    let app = TestApp::spawn().await;
    let health = app.anonymous().health_check().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.database, "connected");

    let (alice, _) = app.user("alice@example.com").await;
    let status = alice.system_status().await.unwrap();
    assert_eq!(status.storage, "memory");
    assert!(status.storage_healthy);
}
