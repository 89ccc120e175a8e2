//! Router tests driven through `tower::ServiceExt::oneshot`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use common::{fake_wav, test_config, ScriptedEngine};
use voxrelay::error::VoxError;
use voxrelay::runtime::VoxRuntime;
use voxrelay::server::{router, AppState};

struct TestServer {
    app: Router,
    runtime: VoxRuntime,
    _dir: TempDir,
}

async fn start(engine: ScriptedEngine, tweak: impl FnOnce(&mut voxrelay::config::VoxConfig)) -> TestServer {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    tweak(&mut config);
    let runtime = VoxRuntime::start_with_engine(config, Arc::new(engine))
        .await
        .unwrap();
    let app = router(AppState::from_runtime(&runtime));
    TestServer {
        app,
        runtime,
        _dir: dir,
    }
}

fn form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn json_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn synthesize_form_returns_wav_for_devanagari_text() {
    let server = start(ScriptedEngine::new(), |_| {}).await;

    // text=नमस्ते, percent-encoded
    let response = tokio::time::timeout(
        Duration::from_secs(10),
        server.app.clone().oneshot(form(
            "/synthesize",
            "text=%E0%A4%A8%E0%A4%AE%E0%A4%B8%E0%A5%8D%E0%A4%A4%E0%A5%87",
        )),
    )
    .await
    .expect("bounded response time")
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"speech_output.wav\""
    );
    assert!(response.headers().contains_key("x-job-id"));
    assert!(response.headers().contains_key("x-request-id"));
    let bytes = body_bytes(response).await;
    assert!(!bytes.is_empty());
    assert_eq!(bytes, fake_wav("नमस्ते"));

    server.runtime.shutdown().await;
}

#[tokio::test]
async fn empty_text_is_rejected_immediately() {
    let engine = ScriptedEngine::new();
    let server = start(engine, |_| {}).await;

    for request in [
        form("/synthesize", "text="),
        form("/synthesize", ""),
        json_post("/api/synthesize", json!({ "text": "   " })),
        json_post("/api/jobs", json!({})),
    ] {
        let response = server.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "empty_text");
    }
    assert!(server.runtime.queue().registry().is_empty());

    server.runtime.shutdown().await;
}

#[tokio::test]
async fn json_synthesis_accepts_language_override() {
    let server = start(ScriptedEngine::new(), |_| {}).await;

    let response = server
        .app
        .clone()
        .oneshot(json_post(
            "/api/synthesize",
            json!({ "text": "hello", "language": "EN" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let job_id = response.headers()["x-job-id"].to_str().unwrap().to_string();
    assert_eq!(body_bytes(response).await, fake_wav("hello"));

    let status = server
        .app
        .clone()
        .oneshot(get(&format!("/api/jobs/{job_id}")))
        .await
        .unwrap();
    let snapshot = body_json(status).await;
    assert_eq!(snapshot["language"], "en");
    assert_eq!(snapshot["state"], "succeeded");

    let bad = server
        .app
        .clone()
        .oneshot(json_post(
            "/api/synthesize",
            json!({ "text": "hello", "language": "english please" }),
        ))
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    server.runtime.shutdown().await;
}

#[tokio::test]
async fn async_job_flow_reports_status_and_serves_download() {
    let server = start(ScriptedEngine::new(), |_| {}).await;

    let response = server
        .app
        .clone()
        .oneshot(json_post("/api/jobs", json!({ "text": "later" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted = body_json(response).await;
    let id: uuid::Uuid = accepted["id"].as_str().unwrap().parse().unwrap();
    let download_url = accepted["download_url"].as_str().unwrap().to_string();

    let mut ticket = server.runtime.queue().registry().subscribe(id).unwrap();
    ticket.wait_timeout(Duration::from_secs(10)).await.unwrap();

    let status = server
        .app
        .clone()
        .oneshot(get(accepted["status_url"].as_str().unwrap()))
        .await
        .unwrap();
    assert_eq!(status.status(), StatusCode::OK);
    let snapshot = body_json(status).await;
    assert_eq!(snapshot["state"], "succeeded");
    assert_eq!(snapshot["attempts"], 1);

    let download = server.app.clone().oneshot(get(&download_url)).await.unwrap();
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(download.headers()[header::CONTENT_TYPE], "audio/wav");
    assert_eq!(body_bytes(download).await, fake_wav("later"));

    let page = server
        .app
        .clone()
        .oneshot(get(&format!("/jobs/{id}")))
        .await
        .unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(page).await).unwrap();
    assert!(html.contains(&download_url));

    server.runtime.shutdown().await;
}

#[tokio::test]
async fn home_form_submission_redirects_to_job_page() {
    let server = start(ScriptedEngine::new(), |_| {}).await;

    let home = server.app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(home.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(home).await).unwrap();
    assert!(html.contains("<form"));

    let response = server
        .app
        .clone()
        .oneshot(form("/", "text=hello+there"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("/jobs/"));

    server.runtime.shutdown().await;
}

#[tokio::test]
async fn download_of_missing_or_invalid_file_is_404_html() {
    let server = start(ScriptedEngine::new(), |_| {}).await;

    for uri in [
        "/download/missing.wav",
        "/download/notes.txt",
        "/download/..%2Fsecret.wav",
    ] {
        let response = server.app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        let ct = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(ct.starts_with("text/html"), "{uri}: {ct}");
    }

    server.runtime.shutdown().await;
}

#[tokio::test]
async fn unknown_jobs_are_404() {
    let server = start(ScriptedEngine::new(), |_| {}).await;

    let missing = uuid::Uuid::new_v4();
    for uri in [
        format!("/api/jobs/{missing}"),
        "/api/jobs/not-a-uuid".to_string(),
        format!("/jobs/{missing}"),
    ] {
        let response = server.app.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }

    server.runtime.shutdown().await;
}

#[tokio::test]
async fn dead_lettered_job_is_a_bad_gateway() {
    let engine = ScriptedEngine::new().always_failing(|| VoxError::api(500, "cuda oom"));
    let server = start(engine, |config| config.max_attempts = 1).await;

    let response = server
        .app
        .clone()
        .oneshot(form("/synthesize", "text=fail"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "engine_failure");
    assert!(body["error"]["job_id"].is_string());

    server.runtime.shutdown().await;
}

#[tokio::test]
async fn slow_engine_hits_the_request_timeout() {
    let engine = ScriptedEngine::new().with_delay(Duration::from_secs(30));
    let server = start(engine, |config| config.request_timeout_secs = 1).await;

    let response = server
        .app
        .clone()
        .oneshot(form("/synthesize", "text=slow"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    server.runtime.shutdown().await;
}

#[tokio::test]
async fn full_queue_is_service_unavailable() {
    let engine = ScriptedEngine::new().with_delay(Duration::from_secs(30));
    let server = start(engine, |config| config.queue_capacity = 1).await;

    let mut statuses = Vec::new();
    for text in ["one", "two", "three"] {
        let response = server
            .app
            .clone()
            .oneshot(json_post("/api/jobs", json!({ "text": text })))
            .await
            .unwrap();
        statuses.push(response.status());
    }
    assert!(statuses.contains(&StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(statuses[0], StatusCode::ACCEPTED);

    server.runtime.shutdown().await;
}

#[tokio::test]
async fn health_and_request_id_propagation() {
    let server = start(ScriptedEngine::new(), |_| {}).await;

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-123")
        .body(Body::empty())
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "trace-123");
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["workers"], 1);
    assert_eq!(body["queue_capacity"], 32);

    server.runtime.shutdown().await;
}
