/// Case workflow REST API endpoints
///
/// Turns operator and UI events into state machine actions for a case. The
/// session must be opened first; opening runs recovery and reports any
/// resumable run found.

use crate::{
    error::SessionError,
    recovery::RecoverySummary,
    session::{PersistTicket, ReviewDecision, SessionManager, SharedSession},
    workflow::{WorkflowAction, WorkflowStage, WorkflowState},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Open case sessions
    pub sessions: Arc<SessionManager>,
}

/// Response for session open
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub case_id: String,
    pub state: WorkflowState,
    /// Present when an interrupted run was restored
    pub recovered: Option<RecoverySummary>,
}

/// Response for any state transition
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub state: WorkflowState,
    /// Whether the new state reached durable storage
    pub persisted: bool,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub run_id: String,
    pub state: WorkflowState,
    pub persisted: bool,
}

/// Create case workflow routes
pub fn create_case_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cases/{case_id}", delete(purge_case))
        .route(
            "/api/cases/{case_id}/session",
            post(open_session).delete(close_session),
        )
        .route(
            "/api/cases/{case_id}/workflow",
            get(get_workflow).delete(discard_workflow),
        )
        .route("/api/cases/{case_id}/workflow/recoverable", get(get_recoverable))
        .route("/api/cases/{case_id}/workflow/start", post(start_workflow))
        .route("/api/cases/{case_id}/workflow/actions", post(dispatch_action))
        .route(
            "/api/cases/{case_id}/workflow/reviews/{stage}",
            post(submit_review),
        )
}

/// Look up an open session, 404 if the case has none
pub(crate) async fn require_session(
    state: &AppState,
    case_id: &str,
) -> Result<SharedSession, StatusCode> {
    state.sessions.get(case_id).await.ok_or_else(|| {
        tracing::warn!("❌ No open workflow session for case {}", case_id);
        StatusCode::NOT_FOUND
    })
}

/// Map a session error to an HTTP status, logging storage failures
pub(crate) fn error_status(case_id: &str, err: &SessionError) -> StatusCode {
    match err {
        SessionError::MissingConsent
        | SessionError::NoDocumentsSelected
        | SessionError::NotReviewable(_)
        | SessionError::StageMismatch { .. }
        | SessionError::NotRunning(_) => {
            tracing::warn!("❌ Rejected request for case {}: {}", case_id, err);
            StatusCode::BAD_REQUEST
        }
        SessionError::RunInProgress { .. } => {
            tracing::warn!("❌ Rejected request for case {}: {}", case_id, err);
            StatusCode::CONFLICT
        }
        SessionError::CheckpointNotFound(_) => StatusCode::NOT_FOUND,
        SessionError::Store(e) => {
            tracing::error!("Storage failure for case {}: {}", case_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Wait for a persistence write and report whether it landed
pub(crate) async fn settle(ticket: PersistTicket) -> bool {
    ticket.outcome().await.is_ok()
}

/// Open (or re-attach to) a case session
///
/// POST /api/cases/{case_id}/session
async fn open_session(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> Json<SessionResponse> {
    let session = state.sessions.open(&case_id).await;
    let session = session.lock().await;

    Json(SessionResponse {
        case_id,
        state: session.state().clone(),
        recovered: session.recovered().cloned(),
    })
}

/// Close a case session (in-memory only)
///
/// DELETE /api/cases/{case_id}/session
async fn close_session(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    if state.sessions.close(&case_id).await {
        Ok(Json(json!({ "message": "Session closed" })))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

/// Current in-memory workflow state
///
/// GET /api/cases/{case_id}/workflow
async fn get_workflow(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> Result<Json<WorkflowState>, StatusCode> {
    let session = require_session(&state, &case_id).await?;
    let session = session.lock().await;
    Ok(Json(session.state().clone()))
}

/// Whether durable storage holds a resumable run
///
/// GET /api/cases/{case_id}/workflow/recoverable
async fn get_recoverable(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let session = require_session(&state, &case_id).await?;
    let session = session.lock().await;
    match session.has_recoverable().await {
        Ok(recoverable) => Ok(Json(json!({ "recoverable": recoverable }))),
        Err(e) => Err(error_status(&case_id, &e)),
    }
}

/// Start a run after checking consent and document selection
///
/// POST /api/cases/{case_id}/workflow/start
async fn start_workflow(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> Result<Json<StartResponse>, StatusCode> {
    let session = require_session(&state, &case_id).await?;
    let (run_id, snapshot, ticket) = {
        let mut session = session.lock().await;
        let (run_id, ticket) = session.start().map_err(|e| error_status(&case_id, &e))?;
        (run_id, session.state().clone(), ticket)
    };

    Ok(Json(StartResponse {
        run_id,
        state: snapshot,
        persisted: settle(ticket).await,
    }))
}

/// Dispatch a workflow action
///
/// POST /api/cases/{case_id}/workflow/actions
/// Body: { "type": "UPDATE_STEP", "step_id": "ocr", "status": "completed" }
async fn dispatch_action(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
    Json(action): Json<WorkflowAction>,
) -> Result<Json<ActionResponse>, StatusCode> {
    // Starts go through the guarded endpoint; restores only through checkpoints
    if matches!(
        action,
        WorkflowAction::StartWorkflow { .. } | WorkflowAction::RestoreState { .. }
    ) {
        tracing::warn!(
            "❌ {} is not accepted on the actions endpoint (case {})",
            action.name(),
            case_id
        );
        return Err(StatusCode::BAD_REQUEST);
    }

    let session = require_session(&state, &case_id).await?;
    // The lock is released before waiting on storage
    let (snapshot, ticket) = {
        let mut session = session.lock().await;
        let ticket = session.dispatch(action);
        (session.state().clone(), ticket)
    };

    Ok(Json(ActionResponse {
        state: snapshot,
        persisted: settle(ticket).await,
    }))
}

/// Record a human review verdict
///
/// POST /api/cases/{case_id}/workflow/reviews/{stage}
/// Body: { "decision": "approve" } or { "decision": "reject", "reason": "..." }
async fn submit_review(
    State(state): State<AppState>,
    Path((case_id, stage)): Path<(String, WorkflowStage)>,
    Json(decision): Json<ReviewDecision>,
) -> Result<Json<ActionResponse>, StatusCode> {
    let session = require_session(&state, &case_id).await?;
    let (snapshot, ticket) = {
        let mut session = session.lock().await;
        let ticket = session
            .review(stage, decision)
            .map_err(|e| error_status(&case_id, &e))?;
        (session.state().clone(), ticket)
    };

    Ok(Json(ActionResponse {
        state: snapshot,
        persisted: settle(ticket).await,
    }))
}

/// Discard the live run (the only way to drop a failed run)
///
/// DELETE /api/cases/{case_id}/workflow
async fn discard_workflow(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> Result<Json<WorkflowState>, StatusCode> {
    let session = require_session(&state, &case_id).await?;
    let mut session = session.lock().await;
    session
        .discard()
        .await
        .map_err(|e| error_status(&case_id, &e))?;
    Ok(Json(session.state().clone()))
}

/// Delete all workflow data for a case
///
/// DELETE /api/cases/{case_id}
async fn purge_case(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    state
        .sessions
        .purge(&case_id)
        .await
        .map_err(|e| error_status(&case_id, &e))?;
    Ok(Json(json!({ "message": "Case workflow data purged" })))
}
