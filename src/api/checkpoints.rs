/// Checkpoint REST API endpoints
///
/// Create, list, and roll back to named workflow snapshots for a case.

use crate::api::cases::{error_status, require_session, settle, ActionResponse, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Request body for checkpoint creation
#[derive(Debug, Default, Deserialize)]
pub struct CreateCheckpointRequest {
    /// Defaults to "Stage: <current stage>"
    #[serde(default)]
    pub label: Option<String>,
}

/// Create checkpoint routes
pub fn create_checkpoint_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/cases/{case_id}/checkpoints",
            post(create_checkpoint).get(list_checkpoints),
        )
        .route(
            "/api/cases/{case_id}/checkpoints/{checkpoint_id}/restore",
            post(restore_checkpoint),
        )
}

/// Snapshot the current workflow state
///
/// POST /api/cases/{case_id}/checkpoints
/// Body (optional): { "label": "before forms review" }
async fn create_checkpoint(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
    payload: Option<Json<CreateCheckpointRequest>>,
) -> Result<Json<Value>, StatusCode> {
    let Json(payload) = payload.unwrap_or_default();
    let session = require_session(&state, &case_id).await?;
    let session = session.lock().await;
    let id = session
        .checkpoint(payload.label.as_deref())
        .await
        .map_err(|e| error_status(&case_id, &e))?;

    Ok(Json(json!({ "id": id })))
}

/// List recent checkpoints, newest first
///
/// GET /api/cases/{case_id}/checkpoints
/// Returns: { "checkpoints": [{ "id": "...", "label": "...", "stage": "...", "created_at": "..." }] }
async fn list_checkpoints(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let session = require_session(&state, &case_id).await?;
    let session = session.lock().await;
    let checkpoints = session
        .checkpoints()
        .await
        .map_err(|e| error_status(&case_id, &e))?;

    Ok(Json(json!({ "checkpoints": checkpoints })))
}

/// Roll the live workflow back to a checkpoint
///
/// POST /api/cases/{case_id}/checkpoints/{checkpoint_id}/restore
async fn restore_checkpoint(
    State(state): State<AppState>,
    Path((case_id, checkpoint_id)): Path<(String, String)>,
) -> Result<Json<ActionResponse>, StatusCode> {
    let session = require_session(&state, &case_id).await?;
    let (snapshot, ticket) = {
        let mut session = session.lock().await;
        let ticket = session
            .rewind(&checkpoint_id)
            .await
            .map_err(|e| error_status(&case_id, &e))?;
        (session.state().clone(), ticket)
    };

    Ok(Json(ActionResponse {
        state: snapshot,
        persisted: settle(ticket).await,
    }))
}
