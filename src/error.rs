/// Error types for storage and session operations
///
/// Storage errors never halt a workflow: callers log them and keep the in-memory
/// state authoritative. Session errors describe caller-side guard failures.

use crate::workflow::types::{WorkflowStage, WorkflowStatus};
use thiserror::Error;

/// Failure of a durable read or write against the workflow database
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported schema version {found} (this build reads up to {supported})")]
    UnsupportedSchema { found: i64, supported: i64 },

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Persistence task failed: {0}")]
    Task(String),
}

/// Failure of a session-level operation on a case workflow
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Operator consent is required before starting a run")]
    MissingConsent,

    #[error("At least one document must be selected before starting a run")]
    NoDocumentsSelected,

    #[error("Run {run_id} is still {status}; resume, retry or discard it instead of starting a new one")]
    RunInProgress {
        run_id: String,
        status: WorkflowStatus,
    },

    #[error("Stage '{0}' is not a human review stage")]
    NotReviewable(WorkflowStage),

    #[error("Review for '{requested}' does not match the active stage '{active}'")]
    StageMismatch {
        requested: WorkflowStage,
        active: WorkflowStage,
    },

    #[error("Run is {0}, reviews require a running workflow")]
    NotRunning(WorkflowStatus),

    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}
