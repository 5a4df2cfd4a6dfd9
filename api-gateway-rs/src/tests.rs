use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use civic_agents::{EvidenceSchema, TicketSynthesizer};
use llm_sdk::{CannedBackend, ServiceError};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::*;

fn app_with(backend: Arc<CannedBackend>) -> Router {
    let synthesizer = TicketSynthesizer::new(backend, EvidenceSchema::bundled().unwrap());
    create_router(AppState::new(Arc::new(synthesizer)))
}

fn app() -> Router {
    app_with(Arc::new(CannedBackend::new()))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn pothole() -> Value {
    json!({
        "user_id": "citizen-7",
        "location": "123 Main St",
        "description": "Large pothole causing vehicle damage"
    })
}

#[tokio::test]
async fn health_reports_serving() {
    let (status, body) = send(&app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
    assert_eq!(body["service_name"], "api-gateway");
    assert_eq!(body["status"], "SERVING");
}

#[tokio::test]
async fn create_ticket_returns_pipeline_response() {
    let (status, body) = send(&app(), post_json("/create_ticket", pothole())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticket"]["issue_category"], "pothole");
    assert_eq!(body["ticket"]["department"], "public works");
    assert_eq!(body["ticket"]["form_url"], "N/A");
    assert_eq!(body["ticket"]["severity"], "High");
    assert_eq!(body["ticket"]["priority"], "high");
    assert!(body["session_id"].is_string());
    assert!(body["elapsed"].is_number());
}

#[tokio::test]
async fn created_session_can_be_fetched() {
    let app = app();
    let (_, created) = send(&app, post_json("/create_ticket", pothole())).await;
    let session_id = created["session_id"].as_str().unwrap();

    let (status, session) = send(&app, get(&format!("/sessions/{}", session_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["user_id"], "citizen-7");

    let kinds: Vec<&str> = session["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event"]["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["research", "evidence", "ticket_created"]);
}

#[tokio::test]
async fn unknown_session_is_404() {
    let app = app();
    let (status, body) = send(&app, get("/sessions/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);

    let mut request = pothole();
    request["session_id"] = json!("does-not-exist");
    let (status, body) = send(&app, post_json("/create_ticket", request)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("does-not-exist"));
}

#[tokio::test]
async fn blank_session_id_starts_a_new_session() {
    let mut request = pothole();
    request["session_id"] = json!("   ");

    let (status, body) = send(&app(), post_json("/create_ticket", request)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["session_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn whitespace_only_fields_fail_validation() {
    let backend = Arc::new(CannedBackend::new());
    let app = app_with(backend.clone());

    let mut blank_description = pothole();
    blank_description["description"] = json!("   ");
    let (status, body) = send(&app, post_json("/create_ticket", blank_description)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].is_array());

    let mut blank_user = pothole();
    blank_user["user_id"] = json!(" \u{0000} ");
    let (status, _) = send(&app, post_json("/create_ticket", blank_user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn unreadable_image_is_400() {
    let mut request = pothole();
    request["image_paths"] = json!(["/no/such/photo.jpg"]);

    let (status, body) = send(&app(), post_json("/create_ticket", request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("/no/such/photo.jpg"));
}

#[tokio::test]
async fn backend_failure_is_502() {
    let backend = Arc::new(CannedBackend::new());
    backend.push_structured(Err(ServiceError::rate_limit("Quota exceeded")));

    let (status, body) = send(&app_with(backend), post_json("/create_ticket", pothole())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], 502);
}

#[tokio::test]
async fn invalid_bodies_are_rejected_before_the_pipeline() {
    let backend = Arc::new(CannedBackend::new());
    let app = app_with(backend.clone());

    let (status, body) = send(&app, post_json("/create_ticket", json!({"user_id": "u"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].is_array());

    let wrong_type = Request::builder()
        .method("POST")
        .uri("/create_ticket")
        .header("content-type", "text/plain")
        .body(Body::from(pothole().to_string()))
        .unwrap();
    let (status, _) = send(&app, wrong_type).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let broken = Request::builder()
        .method("POST")
        .uri("/create_ticket")
        .header("content-type", "application/json")
        .body(Body::from("{\"user_id\": "))
        .unwrap();
    let (status, _) = send(&app, broken).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn oversized_body_is_413() {
    let mut request = pothole();
    request["description"] = json!("x".repeat(validation::MAX_PAYLOAD_SIZE + 1));

    let (status, _) = send(&app(), post_json("/create_ticket", request)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn submit_form_reports_missing_fields() {
    let backend = Arc::new(CannedBackend::new());
    backend.push_text(Ok("Please include a summary.".into()));

    let record = json!({"issue_category": "pothole", "severity": "High", "location": "Main St"});
    let (status, body) = send(&app_with(backend), post_json("/submit_form", record)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["missing_fields"], json!(["summary"]));
    assert_eq!(body["message"], "Please include a summary.");
    assert!(body.get("backend").is_none());
}

#[tokio::test]
async fn notify_returns_all_channels() {
    let backend = Arc::new(CannedBackend::new());
    backend
        .push_text(Ok("Ticket TKT-1 received.".into()))
        .push_text(Ok("Dear resident, ...".into()))
        .push_text(Ok("We got your report.".into()));

    let (status, body) = send(&app_with(backend), post_json("/notify", json!({"ticket_id": "TKT-1"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sms"], "Ticket TKT-1 received.");
    assert_eq!(body["email"], "Dear resident, ...");
    assert_eq!(body["app_notification"], "We got your report.");
}

#[test]
fn error_statuses() {
    let backend = ApiError::from(PipelineError::Backend(ServiceError::timeout("slow")));
    assert_eq!(backend.status(), StatusCode::BAD_GATEWAY);

    let schema = ApiError::from(PipelineError::Schema("bad".into()));
    assert_eq!(schema.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let missing = ApiError::from(StoreError::SessionNotFound("s".into()));
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
