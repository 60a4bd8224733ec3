/// Durable row shapes for live workflow records and checkpoints
///
/// Rows are explicit, versioned structs rather than free-form JSON blobs. Steps
/// and document ids are JSON text columns; everything the recovery path needs
/// to reason about (status, stage, run id) is a plain column.

use crate::error::StoreError;
use crate::workflow::types::{
    WorkflowPatch, WorkflowStage, WorkflowState, WorkflowStatus, WorkflowStep,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Row layout version written by this build
pub const SCHEMA_VERSION: i64 = 1;

/// RFC 3339, UTC, fixed microsecond precision so text order is time order
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{raw}': {e}")))
}

/// The single live workflow row for a case (`workflow_states`)
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PersistedWorkflowRecord {
    pub case_id: String,
    pub schema_version: i64,
    pub workflow_run_id: Option<String>,
    pub status: String,
    pub current_stage: String,
    /// JSON array of `WorkflowStep`
    pub steps: String,
    /// JSON array of document ids, sorted
    pub selected_document_ids: String,
    pub retry_count: i64,
    pub last_error: Option<String>,
    pub has_consent: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl PersistedWorkflowRecord {
    /// Serialize a state for upsert. `run_id` overrides the state's run id when given.
    pub fn from_state(
        case_id: &str,
        state: &WorkflowState,
        run_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let stamp = timestamp(now);
        Ok(Self {
            case_id: case_id.to_string(),
            schema_version: SCHEMA_VERSION,
            workflow_run_id: run_id
                .map(str::to_string)
                .or_else(|| state.workflow_run_id.clone()),
            status: state.status.as_str().to_string(),
            current_stage: state.current_stage.as_str().to_string(),
            steps: serde_json::to_string(&state.steps)?,
            selected_document_ids: serde_json::to_string(&state.selected_document_ids())?,
            retry_count: i64::from(state.retry_count),
            last_error: state.last_error.clone(),
            has_consent: state.has_consent,
            created_at: stamp.clone(),
            updated_at: stamp,
        })
    }

    pub fn status(&self) -> Result<WorkflowStatus, StoreError> {
        parse_status(&self.status)
    }

    /// Partial state carrying every persisted field
    pub fn into_patch(self) -> Result<WorkflowPatch, StoreError> {
        check_version(self.schema_version)?;
        Ok(WorkflowPatch {
            status: Some(parse_status(&self.status)?),
            current_stage: Some(parse_stage(&self.current_stage)?),
            steps: Some(decode_steps(&self.steps)?),
            selected_documents: Some(serde_json::from_str(&self.selected_document_ids)?),
            workflow_run_id: Some(self.workflow_run_id),
            retry_count: Some(decode_retry_count(self.retry_count)?),
            last_error: Some(self.last_error),
            has_consent: Some(self.has_consent),
            is_uploading: None,
        })
    }
}

/// One immutable checkpoint row (`workflow_checkpoints`)
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CheckpointRecord {
    pub id: String,
    pub case_id: String,
    pub schema_version: i64,
    pub workflow_run_id: Option<String>,
    pub checkpoint_label: String,
    pub status: String,
    pub current_stage: String,
    pub steps: String,
    pub selected_document_ids: String,
    pub retry_count: i64,
    pub created_at: String,
}

impl CheckpointRecord {
    /// Copy the checkpointed fields out of a live state
    pub fn capture(
        id: String,
        case_id: &str,
        state: &WorkflowState,
        label: String,
        now: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            id,
            case_id: case_id.to_string(),
            schema_version: SCHEMA_VERSION,
            workflow_run_id: state.workflow_run_id.clone(),
            checkpoint_label: label,
            status: state.status.as_str().to_string(),
            current_stage: state.current_stage.as_str().to_string(),
            steps: serde_json::to_string(&state.steps)?,
            selected_document_ids: serde_json::to_string(&state.selected_document_ids())?,
            retry_count: i64::from(state.retry_count),
            created_at: timestamp(now),
        })
    }

    /// Partial state without `last_error` or `has_consent`: consent must be
    /// re-affirmed and errors belong to the run, not the snapshot.
    pub fn into_patch(self) -> Result<WorkflowPatch, StoreError> {
        check_version(self.schema_version)?;
        Ok(WorkflowPatch {
            status: Some(parse_status(&self.status)?),
            current_stage: Some(parse_stage(&self.current_stage)?),
            steps: Some(decode_steps(&self.steps)?),
            selected_documents: Some(serde_json::from_str(&self.selected_document_ids)?),
            workflow_run_id: Some(self.workflow_run_id),
            retry_count: Some(decode_retry_count(self.retry_count)?),
            last_error: None,
            has_consent: None,
            is_uploading: None,
        })
    }
}

/// Checkpoint listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointSummary {
    pub id: String,
    pub label: String,
    pub stage: WorkflowStage,
    pub created_at: DateTime<Utc>,
}

fn check_version(found: i64) -> Result<(), StoreError> {
    if found > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema {
            found,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(())
}

pub(crate) fn parse_stage(raw: &str) -> Result<WorkflowStage, StoreError> {
    raw.parse()
        .map_err(|e: crate::workflow::types::UnknownStage| StoreError::Corrupt(e.to_string()))
}

fn parse_status(raw: &str) -> Result<WorkflowStatus, StoreError> {
    raw.parse()
        .map_err(|e: crate::workflow::types::UnknownStatus| StoreError::Corrupt(e.to_string()))
}

fn decode_steps(raw: &str) -> Result<Vec<WorkflowStep>, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

fn decode_retry_count(raw: i64) -> Result<u32, StoreError> {
    u32::try_from(raw).map_err(|_| StoreError::Corrupt(format!("retry_count out of range: {raw}")))
}
