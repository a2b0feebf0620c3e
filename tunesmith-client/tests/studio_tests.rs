//! End-to-end flows through `Studio` against a mock upstream

mod common;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tunesmith_client::api::{Credits, GenerateLyricsRequest, GenerateMusicRequest, TaskResult};
use tunesmith_client::{ClientConfig, PollState, Studio, TaskKind, TaskStatus};
use tunesmith_common::{ApiProvider, FileKeyValueStore};

use common::{MockUpstream, TEST_API_KEY};

fn studio_for(upstream: &MockUpstream, dir: &TempDir) -> Studio {
    let config = ClientConfig {
        provider: ApiProvider::SunoApi,
        base_url: upstream.url("/api/v1"),
        request_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(20),
    };
    let storage = Arc::new(FileKeyValueStore::new(dir.path().join("credentials.toml")));
    Studio::new(config, storage).unwrap()
}

async fn submit(Json(body): Json<Value>) -> Json<Value> {
    let task_id = if body["prompt"] == "doomed" { "t-doomed" } else { "t-1" };
    Json(json!({"code": 200, "msg": "success", "data": {"taskId": task_id}}))
}

/// `t-1` succeeds on the third query; `t-doomed` fails without a reason
async fn record_info(
    State(calls): State<Arc<AtomicUsize>>,
    axum::extract::Query(query): axum::extract::Query<std::collections::HashMap<String, String>>,
) -> Json<Value> {
    let seen = calls.fetch_add(1, Ordering::SeqCst);

    if query.get("taskId").map(String::as_str) == Some("t-doomed") {
        return Json(json!({"code": 200, "msg": "success", "data": {"status": "FAILED"}}));
    }

    if seen < 2 {
        return Json(json!({"code": 200, "msg": "success", "data": {"status": "PENDING"}}));
    }

    Json(json!({
        "code": 200,
        "msg": "success",
        "data": {
            "status": "SUCCESS",
            "response": {"data": [{"id": "lyr-1", "title": "Verse", "text": "line one\nline two"}]}
        }
    }))
}

fn mock_app(calls: Arc<AtomicUsize>) -> Router {
    Router::new()
        .route("/api/v1/generate", post(submit))
        .route("/api/v1/lyrics", post(submit))
        .route("/api/v1/generate/record-info", get(record_info))
        .route(
            "/api/v1/get_limit",
            get(|State(calls): State<Arc<AtomicUsize>>| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Json(json!({"code": 200, "msg": "success", "data": {"credits_left": 250}}))
            }),
        )
        .with_state(calls)
}

#[tokio::test]
async fn test_credential_survives_restart() {
    let dir = TempDir::new().unwrap();
    let upstream = MockUpstream::start(Router::new()).await;

    let first = studio_for(&upstream, &dir);
    assert!(!first.auth().is_authenticated());
    assert!(first.auth().login(&format!("  {}  ", TEST_API_KEY)).unwrap());
    drop(first);

    let second = studio_for(&upstream, &dir);
    assert_eq!(second.auth().api_key().as_deref(), Some(TEST_API_KEY));

    upstream.shutdown().await;
}

#[tokio::test]
async fn test_corrupt_credentials_do_not_block_login() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("credentials.toml"), "suno_api_key = = broken").unwrap();
    let upstream = MockUpstream::start(Router::new()).await;

    let studio = studio_for(&upstream, &dir);
    assert!(!studio.auth().is_authenticated());

    assert!(studio.auth().login(TEST_API_KEY).unwrap());
    drop(studio);

    let restarted = studio_for(&upstream, &dir);
    assert_eq!(restarted.auth().api_key().as_deref(), Some(TEST_API_KEY));

    upstream.shutdown().await;
}

#[tokio::test]
async fn test_submit_and_track_to_success() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let upstream = MockUpstream::start(mock_app(calls.clone())).await;
    let studio = studio_for(&upstream, &dir);
    studio.auth().login(TEST_API_KEY).unwrap();

    let task_id = studio
        .submit_lyrics(&GenerateLyricsRequest::new("a song about ferries"))
        .await
        .unwrap();
    assert_eq!(task_id, "t-1");

    let pending = studio.task("t-1").unwrap();
    assert_eq!(pending.kind, TaskKind::Lyrics);
    assert_eq!(pending.status, TaskStatus::Pending);
    assert_eq!(pending.prompt, "a song about ferries");

    let outcome_rx = studio.track(&task_id).unwrap();
    assert_eq!(studio.poll_state(), PollState::Polling);
    assert!(studio.track(&task_id).is_none());

    let outcome = tokio::time::timeout(Duration::from_secs(5), outcome_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.status, TaskStatus::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let done = studio.task("t-1").unwrap();
    assert_eq!(done.status, TaskStatus::Success);
    match done.result {
        Some(TaskResult::Lyrics(sheets)) => assert_eq!(sheets[0].text, "line one\nline two"),
        other => panic!("expected lyrics, got {:?}", other),
    }
    assert_eq!(studio.poll_state(), PollState::Terminal);

    upstream.shutdown().await;
}

#[tokio::test]
async fn test_failed_task_gets_default_error() {
    let dir = TempDir::new().unwrap();
    let upstream = MockUpstream::start(mock_app(Arc::new(AtomicUsize::new(0)))).await;
    let studio = studio_for(&upstream, &dir);
    studio.auth().login(TEST_API_KEY).unwrap();

    let task_id = studio
        .submit_music(&GenerateMusicRequest::new("doomed"))
        .await
        .unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), studio.track(&task_id).unwrap())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.status, TaskStatus::Failed);
    let record = studio.task("t-doomed").unwrap();
    assert_eq!(record.kind, TaskKind::Music);
    assert_eq!(record.status, TaskStatus::Failed);
    assert_eq!(record.error.as_deref(), Some("generation failed"));

    upstream.shutdown().await;
}

#[tokio::test]
async fn test_check_status_applies_terminal_answer() {
    let dir = TempDir::new().unwrap();
    let upstream = MockUpstream::start(mock_app(Arc::new(AtomicUsize::new(0)))).await;
    let studio = studio_for(&upstream, &dir);
    studio.auth().login(TEST_API_KEY).unwrap();

    studio
        .submit_music(&GenerateMusicRequest::new("doomed"))
        .await
        .unwrap();
    studio.check_status("t-doomed").await.unwrap();

    assert_eq!(studio.task("t-doomed").unwrap().status, TaskStatus::Failed);

    upstream.shutdown().await;
}

#[tokio::test]
async fn test_credits_are_cached() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let upstream = MockUpstream::start(mock_app(calls.clone())).await;
    let studio = studio_for(&upstream, &dir);

    assert_eq!(studio.credits(false).await, None);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    studio.auth().login(TEST_API_KEY).unwrap();
    assert_eq!(studio.credits(false).await, Some(Credits::Remaining(250)));
    assert_eq!(studio.credits(false).await, Some(Credits::Remaining(250)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    studio.credits(true).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    upstream.shutdown().await;
}

#[tokio::test]
async fn test_reset_forgets_everything() {
    let dir = TempDir::new().unwrap();
    let upstream = MockUpstream::start(mock_app(Arc::new(AtomicUsize::new(0)))).await;
    let studio = studio_for(&upstream, &dir);
    studio.auth().login(TEST_API_KEY).unwrap();

    let task_id = studio
        .submit_music(&GenerateMusicRequest::new("a march"))
        .await
        .unwrap();
    let outcome_rx = studio.track(&task_id).unwrap();

    studio.reset().await.unwrap();

    assert!(studio.tasks().is_empty());
    assert!(!studio.auth().is_authenticated());
    assert_eq!(studio.poll_state(), PollState::Idle);
    // Stopped session drops its callback without sending
    assert!(outcome_rx.await.is_err());

    let restarted = studio_for(&upstream, &dir);
    assert!(!restarted.auth().is_authenticated());

    upstream.shutdown().await;
}
