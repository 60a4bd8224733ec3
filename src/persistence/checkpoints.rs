/// Named, immutable workflow snapshots
///
/// Checkpoints are operator-created history a case can be rolled back to. They
/// are inserted once and never updated; only a case purge removes them.

use crate::error::StoreError;
use crate::persistence::records::{parse_stage, parse_timestamp, CheckpointRecord, CheckpointSummary};
use crate::workflow::types::{WorkflowPatch, WorkflowState};
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

/// Checkpoint storage for one case
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    pool: SqlitePool,
    case_id: String,
    /// Maximum entries returned by `list`
    list_limit: u32,
}

impl CheckpointStore {
    pub fn new(pool: SqlitePool, case_id: impl Into<String>, list_limit: u32) -> Self {
        Self {
            pool,
            case_id: case_id.into(),
            list_limit,
        }
    }

    /// Snapshot a state under a label (default: "Stage: <current stage>")
    ///
    /// Returns the generated checkpoint id.
    pub async fn create(&self, state: &WorkflowState, label: Option<&str>) -> Result<String, StoreError> {
        let label = label
            .map(str::to_string)
            .unwrap_or_else(|| format!("Stage: {}", state.current_stage));
        let record = CheckpointRecord::capture(
            Uuid::new_v4().to_string(),
            &self.case_id,
            state,
            label,
            Utc::now(),
        )?;

        sqlx::query(
            r#"
            INSERT INTO workflow_checkpoints (
                id, case_id, schema_version, workflow_run_id, checkpoint_label, status,
                current_stage, steps, selected_document_ids, retry_count, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.case_id)
        .bind(record.schema_version)
        .bind(&record.workflow_run_id)
        .bind(&record.checkpoint_label)
        .bind(&record.status)
        .bind(&record.current_stage)
        .bind(&record.steps)
        .bind(&record.selected_document_ids)
        .bind(record.retry_count)
        .bind(&record.created_at)
        .execute(&self.pool)
        .await
        .inspect_err(|e| {
            tracing::warn!("⚠️ Failed to create checkpoint for case {}: {}", self.case_id, e)
        })?;

        tracing::info!(
            "📌 Created checkpoint {} '{}' for case {}",
            record.id,
            record.checkpoint_label,
            self.case_id
        );

        Ok(record.id)
    }

    /// Most recent checkpoints first, capped at the configured limit
    pub async fn list(&self) -> Result<Vec<CheckpointSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, checkpoint_label, current_stage, created_at
            FROM workflow_checkpoints
            WHERE case_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(&self.case_id)
        .bind(i64::from(self.list_limit))
        .fetch_all(&self.pool)
        .await?;

        let mut checkpoints = Vec::with_capacity(rows.len());
        for row in rows {
            let stage: String = row.get("current_stage");
            let created_at: String = row.get("created_at");
            checkpoints.push(CheckpointSummary {
                id: row.get("id"),
                label: row.get("checkpoint_label"),
                stage: parse_stage(&stage)?,
                created_at: parse_timestamp(&created_at)?,
            });
        }

        Ok(checkpoints)
    }

    /// Read one checkpoint of this case back as a partial state
    ///
    /// The patch never carries `last_error` or `has_consent`.
    pub async fn restore_from(&self, checkpoint_id: &str) -> Result<Option<WorkflowPatch>, StoreError> {
        let record = sqlx::query_as::<_, CheckpointRecord>(
            "SELECT * FROM workflow_checkpoints WHERE id = ? AND case_id = ?",
        )
        .bind(checkpoint_id)
        .bind(&self.case_id)
        .fetch_optional(&self.pool)
        .await?;

        match record {
            Some(record) => Ok(Some(record.into_patch()?)),
            None => {
                tracing::debug!(
                    "🔍 Checkpoint {} not found for case {}",
                    checkpoint_id,
                    self.case_id
                );
                Ok(None)
            }
        }
    }

    /// Delete every checkpoint of the case; returns how many were removed
    pub async fn purge(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM workflow_checkpoints WHERE case_id = ?")
            .bind(&self.case_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(
            "🧹 Purged {} checkpoints for case {}",
            result.rows_affected(),
            self.case_id
        );

        Ok(result.rows_affected())
    }
}
