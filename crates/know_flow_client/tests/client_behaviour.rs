//! Behaviour of the request core and the chat flow against a throwaway local server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use know_flow_client::{ApiClient, ChatRole, ClientConfig, ClientError, RequestOptions, StudyChat};
use know_flow_core::domain::{LearningContext, LearningStyle, PlanStatus};
use know_flow_core::protocol::PlanListOptions;
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct Recorder {
    hits: Arc<AtomicUsize>,
    last_body: Arc<Mutex<Option<Value>>>,
}

impl Recorder {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn fast_config(base_url: &str) -> ClientConfig {
    ClientConfig::new(base_url)
        .with_timeout(Duration::from_millis(150))
        .with_retries(3, Duration::from_millis(10))
}

async fn slow(State(recorder): State<Recorder>) -> Json<Value> {
    recorder.hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(600)).await;
    Json(json!({ "success": true, "data": null }))
}

async fn ai_down(State(recorder): State<Recorder>) -> (StatusCode, Json<Value>) {
    recorder.hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": "AI service unavailable" })),
    )
}

async fn flaky_gateway(State(recorder): State<Recorder>) -> (StatusCode, Json<Value>) {
    recorder.hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "success": false, "error": "upstream network unreachable" })),
    )
}

async fn unauthorized(State(recorder): State<Recorder>) -> (StatusCode, Json<Value>) {
    recorder.hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "error": "Authentication required" })),
    )
}

async fn invalid(State(recorder): State<Recorder>) -> (StatusCode, Json<Value>) {
    recorder.hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "success": false, "error": "Prompt is required", "details": "prompt" })),
    )
}

async fn echo_auth(headers: HeaderMap) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(json!({ "success": true, "data": auth }))
}

async fn echo_query(RawQuery(query): RawQuery) -> Json<Value> {
    Json(json!({ "success": false, "error": query.unwrap_or_default() }))
}

async fn generate(State(recorder): State<Recorder>, Json(body): Json<Value>) -> Json<Value> {
    recorder.hits.fetch_add(1, Ordering::SeqCst);
    *recorder.last_body.lock().unwrap() = Some(body);
    Json(json!({
        "success": true,
        "data": {
            "planId": "p1",
            "plan_title": "Python Basics",
            "lessons": [{ "title": "Variables" }, { "title": "Functions" }]
        }
    }))
}

fn router(recorder: Recorder) -> Router {
    Router::new()
        .route("/slow", get(slow))
        .route("/ai-down", post(ai_down))
        .route("/flaky", get(flaky_gateway))
        .route("/private", get(unauthorized))
        .route("/invalid", post(invalid))
        .route("/whoami", get(echo_auth))
        .route("/api/users/{uid}/plans", get(echo_query))
        .route("/api/generate-learning-plan", post(generate))
        .with_state(recorder)
}

#[tokio::test]
async fn timeouts_are_retried_until_attempts_run_out() {
    let recorder = Recorder::default();
    let base = serve(router(recorder.clone())).await;
    let client = ApiClient::new(fast_config(&base)).unwrap();

    let err = client.request("/slow", RequestOptions::get()).await.unwrap_err();

    assert!(matches!(err, ClientError::Timeout));
    assert_eq!(err.to_string(), "Request timeout");
    assert_eq!(recorder.hits(), 4);
}

#[tokio::test]
async fn per_call_retry_override_wins() {
    let recorder = Recorder::default();
    let base = serve(router(recorder.clone())).await;
    let client = ApiClient::new(fast_config(&base)).unwrap();

    let err = client
        .request("/slow", RequestOptions::get().retry_attempts(0))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Timeout));
    assert_eq!(recorder.hits(), 1);
}

#[tokio::test]
async fn server_error_without_transient_signature_fails_once() {
    let recorder = Recorder::default();
    let base = serve(router(recorder.clone())).await;
    let client = ApiClient::new(fast_config(&base)).unwrap();

    let err = client
        .request("/ai-down", RequestOptions::post(&json!({})).unwrap())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "AI service unavailable");
    assert_eq!(err.status(), Some(500));
    assert_eq!(recorder.hits(), 1);
}

#[tokio::test]
async fn transient_message_is_retried_with_flat_delay() {
    let recorder = Recorder::default();
    let base = serve(router(recorder.clone())).await;
    let client = ApiClient::new(
        ClientConfig::new(&base).with_retries(2, Duration::from_millis(50)),
    )
    .unwrap();

    let started = Instant::now();
    let err = client.request("/flaky", RequestOptions::get()).await.unwrap_err();

    assert_eq!(err.to_string(), "upstream network unreachable");
    assert_eq!(recorder.hits(), 3);
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn auth_and_validation_failures_are_not_retried() {
    let recorder = Recorder::default();
    let base = serve(router(recorder.clone())).await;
    let client = ApiClient::new(fast_config(&base)).unwrap();

    let err = client.request("/private", RequestOptions::get()).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized { .. }));
    assert_eq!(recorder.hits(), 1);

    let err = client
        .request("/invalid", RequestOptions::post(&json!({})).unwrap())
        .await
        .unwrap_err();
    match err {
        ClientError::Validation { message, details } => {
            assert_eq!(message, "Prompt is required");
            assert_eq!(details.as_deref(), Some("prompt"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(recorder.hits(), 2);
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(
        ClientConfig::new(format!("http://{}", addr)).with_retries(2, Duration::from_millis(20)),
    )
    .unwrap();
    let started = Instant::now();
    let err = client.request("/health", RequestOptions::get()).await.unwrap_err();

    assert!(matches!(err, ClientError::Network(_)), "{:?}", err);
    assert!(err.is_retryable());
    assert!(started.elapsed() >= Duration::from_millis(40));
}

#[tokio::test]
async fn identity_travels_as_bearer_token() {
    let base = serve(router(Recorder::default())).await;
    let anonymous = ApiClient::new(fast_config(&base)).unwrap();
    let alice = anonymous.clone().with_identity("alice");

    let body = alice.request("/whoami", RequestOptions::get()).await.unwrap();
    assert_eq!(body["data"], "Bearer alice");

    let body = anonymous.request("/whoami", RequestOptions::get()).await.unwrap();
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn success_false_surfaces_as_error() {
    let base = serve(router(Recorder::default())).await;
    let client = ApiClient::new(fast_config(&base)).unwrap();

    let options = PlanListOptions {
        limit: Some(5),
        status: Some(PlanStatus::Active),
        topics: vec!["rust".into(), "async".into()],
        ..Default::default()
    };
    // The stub echoes the query string back as the failure message.
    let err = client.list_user_plans("u1", &options).await.unwrap_err();
    let echoed = err.to_string();
    assert!(echoed.contains("limit=5"), "{}", echoed);
    assert!(echoed.contains("status=active"), "{}", echoed);
    assert!(echoed.contains("topics=rust%2Casync"), "{}", echoed);
}

#[tokio::test]
async fn chat_records_generated_plan() {
    let recorder = Recorder::default();
    let base = serve(router(recorder.clone())).await;
    let client = ApiClient::new(fast_config(&base)).unwrap().with_identity("u1");
    let context = LearningContext {
        learning_style: Some(LearningStyle::Visual),
        ..Default::default()
    };
    let mut chat = StudyChat::new(client, "u1", context);

    let plan = chat.send_prompt("Learn Python").await.cloned();

    let plan = plan.expect("plan");
    assert_eq!(plan.id, "p1");
    assert_eq!(plan.title, "Python Basics");
    assert_eq!(plan.lessons.len(), 2);

    let sent = recorder.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(sent["userId"], "u1");
    assert_eq!(sent["prompt"], "Learn Python");
    assert_eq!(sent["context"]["learning_style"], "visual");

    let assistant: Vec<_> = chat
        .messages()
        .iter()
        .filter(|m| m.role == ChatRole::Assistant)
        .collect();
    assert_eq!(assistant.len(), 1);
    assert!(assistant[0].content.contains("Python Basics"));
    assert!(!assistant[0].is_error);
    assert_eq!(chat.current_plan().map(|p| p.id.as_str()), Some("p1"));
}

#[tokio::test]
async fn chat_reports_failure_as_single_error_message() {
    let recorder = Recorder::default();
    let app = Router::new()
        .route("/api/generate-learning-plan", post(ai_down))
        .with_state(recorder.clone());
    let base = serve(app).await;
    let client = ApiClient::new(fast_config(&base)).unwrap();
    let mut chat = StudyChat::new(client, "u1", LearningContext::default());

    assert!(chat.send_prompt("Learn Python").await.is_none());

    let assistant: Vec<_> = chat
        .messages()
        .iter()
        .filter(|m| m.role == ChatRole::Assistant)
        .collect();
    assert_eq!(assistant.len(), 1);
    assert_eq!(assistant[0].content, "AI service unavailable");
    assert!(assistant[0].is_error);
    assert_eq!(chat.last_error(), Some("AI service unavailable"));
    assert!(chat.current_plan().is_none());
    assert_eq!(recorder.hits(), 1);
}
