/// Live workflow record persistence
///
/// Bridges the in-memory state machine and durable storage for one case. The
/// live record is a trailing replica: write failures are logged and returned
/// to the caller, never raised into the reducer.

use crate::error::StoreError;
use crate::persistence::records::PersistedWorkflowRecord;
use crate::workflow::types::{WorkflowPatch, WorkflowState, WorkflowStatus};
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};

/// Upsert/read/delete access to one case's live workflow record
#[derive(Debug, Clone)]
pub struct PersistenceGateway {
    /// SQLite connection pool for the workflow database
    pool: SqlitePool,
    case_id: String,
}

impl PersistenceGateway {
    pub fn new(pool: SqlitePool, case_id: impl Into<String>) -> Self {
        Self {
            pool,
            case_id: case_id.into(),
        }
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    /// Store a state as the case's live record
    ///
    /// Uses UPSERT keyed by case id; `created_at` survives updates. When `run_id`
    /// is given it is stored instead of the state's own run id.
    pub async fn persist(&self, state: &WorkflowState, run_id: Option<&str>) -> Result<(), StoreError> {
        match self.upsert(state, run_id).await {
            Ok(()) => {
                tracing::debug!(
                    "💾 Persisted workflow for case {} (status: {}, stage: {})",
                    self.case_id,
                    state.status,
                    state.current_stage
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!("⚠️ Failed to persist workflow for case {}: {}", self.case_id, e);
                Err(e)
            }
        }
    }

    async fn upsert(&self, state: &WorkflowState, run_id: Option<&str>) -> Result<(), StoreError> {
        let record = PersistedWorkflowRecord::from_state(&self.case_id, state, run_id, Utc::now())?;

        sqlx::query(
            r#"
            INSERT INTO workflow_states (
                case_id, schema_version, workflow_run_id, status, current_stage, steps,
                selected_document_ids, retry_count, last_error, has_consent, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(case_id) DO UPDATE SET
                schema_version = excluded.schema_version,
                workflow_run_id = excluded.workflow_run_id,
                status = excluded.status,
                current_stage = excluded.current_stage,
                steps = excluded.steps,
                selected_document_ids = excluded.selected_document_ids,
                retry_count = excluded.retry_count,
                last_error = excluded.last_error,
                has_consent = excluded.has_consent,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.case_id)
        .bind(record.schema_version)
        .bind(&record.workflow_run_id)
        .bind(&record.status)
        .bind(&record.current_stage)
        .bind(&record.steps)
        .bind(&record.selected_document_ids)
        .bind(record.retry_count)
        .bind(&record.last_error)
        .bind(record.has_consent)
        .bind(&record.created_at)
        .bind(&record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch the raw live record, if any
    pub async fn load_record(&self) -> Result<Option<PersistedWorkflowRecord>, StoreError> {
        let record = sqlx::query_as::<_, PersistedWorkflowRecord>(
            "SELECT * FROM workflow_states WHERE case_id = ? ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(&self.case_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Read the live record back as a partial state for `RESTORE_STATE`
    pub async fn restore(&self) -> Result<Option<WorkflowPatch>, StoreError> {
        match self.load_record().await? {
            Some(record) => Ok(Some(record.into_patch()?)),
            None => Ok(None),
        }
    }

    /// Delete the live record; returns whether one existed
    pub async fn clear(&self) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM workflow_states WHERE case_id = ?")
            .bind(&self.case_id)
            .execute(&self.pool)
            .await
            .inspect_err(|e| {
                tracing::warn!("⚠️ Failed to clear workflow for case {}: {}", self.case_id, e)
            })?;

        let removed = result.rows_affected() > 0;
        if removed {
            tracing::info!("🧹 Cleared live workflow record for case {}", self.case_id);
        }
        Ok(removed)
    }

    /// True iff a live record exists whose status is running, paused or failed
    pub async fn has_recoverable(&self) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT status FROM workflow_states WHERE case_id = ?")
            .bind(&self.case_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let status: String = row.get("status");
                match status.parse::<WorkflowStatus>() {
                    Ok(status) => Ok(status.is_recoverable()),
                    Err(e) => {
                        tracing::warn!(
                            "⚠️ Live record for case {} is not recoverable: {}",
                            self.case_id,
                            e
                        );
                        Ok(false)
                    }
                }
            }
            None => Ok(false),
        }
    }
}
