//! HTTP-level tests for the case workflow API.
//!
//! Each test builds the router over a private in-memory database and drives it
//! with `oneshot` requests.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use docflow::config::WorkflowConfig;
use docflow::persistence::database::connect_in_memory;
use docflow::{build_router, SessionManager};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> Router {
    let pool = connect_in_memory().await.unwrap();
    build_router(Arc::new(SessionManager::new(pool, WorkflowConfig::default())))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn action(app: &Router, case: &str, body: Value) -> Value {
    let (status, value) = send(
        app,
        "POST",
        &format!("/api/cases/{case}/workflow/actions"),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "action failed: {value}");
    assert_eq!(value["persisted"], json!(true));
    value["state"].clone()
}

#[tokio::test]
async fn health_and_stage_listing() {
    let app = test_app().await;

    let (status, _) = send(&app, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/api/stages", None).await;
    assert_eq!(status, StatusCode::OK);
    let stages = body["stages"].as_array().unwrap();
    assert_eq!(stages.len(), 9);
    assert_eq!(stages[0]["id"], "upload");
    assert_eq!(stages[8]["id"], "pdf_generation");
    assert_eq!(stages[2]["kind"], "human_review");
}

#[tokio::test]
async fn workflow_endpoints_require_an_open_session() {
    let app = test_app().await;

    let (status, _) = send(&app, "GET", "/api/cases/case-1/workflow", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/api/cases/case-1/workflow/actions",
        Some(json!({ "type": "PAUSE_WORKFLOW" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn start_is_guarded_and_restore_is_not_an_action() {
    let app = test_app().await;
    send(&app, "POST", "/api/cases/case-1/session", None).await;

    let (status, _) = send(&app, "POST", "/api/cases/case-1/workflow/start", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/cases/case-1/workflow/actions",
        Some(json!({ "type": "START_WORKFLOW", "run_id": "sneaky" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/cases/case-1/workflow/actions",
        Some(json!({ "type": "RESTORE_STATE", "patch": { "status": "completed" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/cases/case-1/workflow/reviews/notarize",
        Some(json!({ "decision": "approve" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn interrupted_run_survives_a_reload() {
    let app = test_app().await;

    let (status, opened) = send(&app, "POST", "/api/cases/case-1/session", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(opened["recovered"], Value::Null);
    assert_eq!(opened["state"]["status"], "idle");

    action(
        &app,
        "case-1",
        json!({ "type": "SELECT_ALL_DOCUMENTS", "ids": ["passport", "i-94"] }),
    )
    .await;
    action(&app, "case-1", json!({ "type": "SET_CONSENT", "value": true })).await;

    let (status, started) = send(&app, "POST", "/api/cases/case-1/workflow/start", None).await;
    assert_eq!(status, StatusCode::OK);
    let run_id = started["run_id"].as_str().unwrap().to_string();
    assert_eq!(started["state"]["current_stage"], "ai_classify");

    let (status, _) = send(&app, "POST", "/api/cases/case-1/workflow/start", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    action(
        &app,
        "case-1",
        json!({ "type": "UPDATE_STEP", "step_id": "ai_classify", "status": "completed" }),
    )
    .await;
    action(&app, "case-1", json!({ "type": "SET_STAGE", "stage": "hac_classify" })).await;

    let (status, checkpoint) = send(
        &app,
        "POST",
        "/api/cases/case-1/checkpoints",
        Some(json!({ "label": "awaiting classification review" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let checkpoint_id = checkpoint["id"].as_str().unwrap().to_string();

    let (status, reviewed) = send(
        &app,
        "POST",
        "/api/cases/case-1/workflow/reviews/hac_classify",
        Some(json!({ "decision": "approve" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["state"]["current_stage"], "ocr");

    let failed = action(
        &app,
        "case-1",
        json!({ "type": "FAIL_WORKFLOW", "error": "ocr timeout" }),
    )
    .await;
    assert_eq!(failed["status"], "failed");

    // Simulate a page reload: drop the in-memory session and reopen it
    let (status, _) = send(&app, "DELETE", "/api/cases/case-1/session", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, reopened) = send(&app, "POST", "/api/cases/case-1/session", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reopened["recovered"]["workflow_run_id"], json!(run_id));
    assert_eq!(reopened["recovered"]["current_stage"], "ocr");
    assert_eq!(reopened["recovered"]["last_error"], "ocr timeout");
    assert_eq!(reopened["state"]["selected_documents"], json!(["i-94", "passport"]));

    let retried = action(&app, "case-1", json!({ "type": "RETRY_WORKFLOW" })).await;
    assert_eq!(retried["status"], "running");
    assert_eq!(retried["retry_count"], 1);
    assert_eq!(retried["current_stage"], "ocr");

    let (status, listed) = send(&app, "GET", "/api/cases/case-1/checkpoints", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["checkpoints"][0]["label"], "awaiting classification review");
    assert_eq!(listed["checkpoints"][0]["stage"], "hac_classify");

    let (status, rewound) = send(
        &app,
        "POST",
        &format!("/api/cases/case-1/checkpoints/{checkpoint_id}/restore"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rewound["state"]["current_stage"], "hac_classify");
    assert_eq!(rewound["state"]["retry_count"], 0);

    let (status, _) = send(
        &app,
        "POST",
        "/api/cases/case-1/checkpoints/missing/restore",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, recoverable) = send(&app, "GET", "/api/cases/case-1/workflow/recoverable", None).await;
    assert_eq!(recoverable["recoverable"], true);

    let (status, discarded) = send(&app, "DELETE", "/api/cases/case-1/workflow", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(discarded["status"], "idle");

    let (_, recoverable) = send(&app, "GET", "/api/cases/case-1/workflow/recoverable", None).await;
    assert_eq!(recoverable["recoverable"], false);
}

#[tokio::test]
async fn completed_run_leaves_nothing_to_recover() {
    let app = test_app().await;
    send(&app, "POST", "/api/cases/case-2/session", None).await;
    action(&app, "case-2", json!({ "type": "SELECT_DOCUMENT", "id": "n-400" })).await;
    action(&app, "case-2", json!({ "type": "SET_CONSENT", "value": true })).await;
    send(&app, "POST", "/api/cases/case-2/workflow/start", None).await;
    action(&app, "case-2", json!({ "type": "SET_STAGE", "stage": "pdf_generation" })).await;
    let done = action(&app, "case-2", json!({ "type": "COMPLETE_WORKFLOW" })).await;
    assert_eq!(done["status"], "completed");

    send(&app, "DELETE", "/api/cases/case-2/session", None).await;
    let (_, reopened) = send(&app, "POST", "/api/cases/case-2/session", None).await;
    assert_eq!(reopened["recovered"], Value::Null);
    assert_eq!(reopened["state"]["status"], "idle");
}

#[tokio::test]
async fn purge_removes_case_data() {
    let app = test_app().await;
    send(&app, "POST", "/api/cases/case-3/session", None).await;
    action(&app, "case-3", json!({ "type": "PAUSE_WORKFLOW" })).await;
    send(&app, "POST", "/api/cases/case-3/checkpoints", Some(json!({}))).await;

    let (status, _) = send(&app, "DELETE", "/api/cases/case-3", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/api/cases/case-3/workflow", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, reopened) = send(&app, "POST", "/api/cases/case-3/session", None).await;
    assert_eq!(reopened["recovered"], Value::Null);
    let (_, listed) = send(&app, "GET", "/api/cases/case-3/checkpoints", None).await;
    assert_eq!(listed["checkpoints"], json!([]));
}

#[tokio::test]
async fn checkpoint_body_is_optional() {
    let app = test_app().await;
    send(&app, "POST", "/api/cases/case-4/session", None).await;
    action(&app, "case-4", json!({ "type": "SET_STAGE", "stage": "ocr" })).await;

    let (status, created) = send(&app, "POST", "/api/cases/case-4/checkpoints", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(created["id"].is_string());

    let (_, listed) = send(&app, "GET", "/api/cases/case-4/checkpoints", None).await;
    assert_eq!(listed["checkpoints"][0]["label"], "Stage: ocr");
}

#[tokio::test]
async fn paused_run_cannot_be_started_again() {
    let app = test_app().await;
    send(&app, "POST", "/api/cases/case-5/session", None).await;
    action(&app, "case-5", json!({ "type": "SELECT_DOCUMENT", "id": "n-400" })).await;
    action(&app, "case-5", json!({ "type": "SET_CONSENT", "value": true })).await;
    let (_, started) = send(&app, "POST", "/api/cases/case-5/workflow/start", None).await;
    action(&app, "case-5", json!({ "type": "PAUSE_WORKFLOW" })).await;

    let (status, _) = send(&app, "POST", "/api/cases/case-5/workflow/start", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let resumed = action(&app, "case-5", json!({ "type": "RESUME_WORKFLOW" })).await;
    assert_eq!(resumed["status"], "running");
    assert_eq!(resumed["workflow_run_id"], started["run_id"]);
}
