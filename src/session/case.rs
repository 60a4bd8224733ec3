/// Case workflow session
///
/// The single owner of one case's `WorkflowState`. Every transition runs the
/// reducer synchronously; durable writes are queued on the case's writer so a
/// slow database never delays in-memory transitions, and writes still land in
/// dispatch order.

use crate::config::WorkflowConfig;
use crate::error::SessionError;
use crate::persistence::{CheckpointStore, CheckpointSummary, PersistenceGateway};
use crate::recovery::{RecoveryCoordinator, RecoverySummary};
use crate::session::writer::{PersistTicket, RecordWriter};
use crate::workflow::{
    StageKind, StepRegistry, StepStatus, WorkflowAction, WorkflowStage, WorkflowState,
    WorkflowStateMachine, WorkflowStatus,
};
use serde::Deserialize;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

/// Human review verdict for a HAC stage
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject { reason: String },
}

/// One case's live orchestration session
#[derive(Debug)]
pub struct CaseSession {
    case_id: String,
    state: WorkflowState,
    gateway: PersistenceGateway,
    /// Ordered queue for every live-record write
    writer: RecordWriter,
    checkpoints: CheckpointStore,
    /// Set when the session opened on a recovered run
    recovered: Option<RecoverySummary>,
    clear_on_complete: bool,
}

impl CaseSession {
    /// Open a session, seeding state through the recovery protocol
    pub async fn open(case_id: &str, pool: SqlitePool, config: &WorkflowConfig) -> Self {
        let gateway = PersistenceGateway::new(pool.clone(), case_id);
        let checkpoints = CheckpointStore::new(pool, case_id, config.checkpoint_list_limit);
        let (state, recovered) = RecoveryCoordinator::new(&gateway).recover().await.into_parts();

        tracing::info!(
            "📂 Opened workflow session for case {} ({})",
            case_id,
            if recovered.is_some() { "recovered" } else { "fresh" }
        );

        Self {
            case_id: case_id.to_string(),
            state,
            writer: RecordWriter::spawn(gateway.clone()),
            gateway,
            checkpoints,
            recovered,
            clear_on_complete: config.clear_on_complete,
        }
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn recovered(&self) -> Option<&RecoverySummary> {
        self.recovered.as_ref()
    }

    /// Apply an action and schedule persistence of the resulting state
    pub fn dispatch(&mut self, action: WorkflowAction) -> PersistTicket {
        self.apply(action);
        self.persist_snapshot()
    }

    /// Guarded `START_WORKFLOW` with a freshly generated run id
    ///
    /// Refused while an unfinished run (running, paused or failed) exists: that
    /// run keeps its id and is continued with `RESUME_WORKFLOW` or
    /// `RETRY_WORKFLOW`, or dropped with `discard`.
    pub fn start(&mut self) -> Result<(String, PersistTicket), SessionError> {
        if !self.state.has_consent {
            return Err(SessionError::MissingConsent);
        }
        if self.state.selected_documents.is_empty() {
            return Err(SessionError::NoDocumentsSelected);
        }
        if self.state.status.is_recoverable() {
            return Err(SessionError::RunInProgress {
                run_id: self.state.workflow_run_id.clone().unwrap_or_default(),
                status: self.state.status,
            });
        }

        let run_id = Uuid::new_v4().to_string();
        tracing::info!("🚀 Starting workflow run {} for case {}", run_id, self.case_id);
        let ticket = self.dispatch(WorkflowAction::StartWorkflow {
            run_id: run_id.clone(),
        });
        Ok((run_id, ticket))
    }

    /// Record a HAC verdict for the active review stage
    ///
    /// Approval completes the step and advances to the next stage; rejection
    /// fails the step without failing the run.
    pub fn review(
        &mut self,
        stage: WorkflowStage,
        decision: ReviewDecision,
    ) -> Result<PersistTicket, SessionError> {
        if StepRegistry::definition(stage).kind != StageKind::HumanReview {
            return Err(SessionError::NotReviewable(stage));
        }
        if self.state.status != WorkflowStatus::Running {
            return Err(SessionError::NotRunning(self.state.status));
        }
        if self.state.current_stage != stage {
            return Err(SessionError::StageMismatch {
                requested: stage,
                active: self.state.current_stage,
            });
        }

        match decision {
            ReviewDecision::Approve => {
                tracing::info!("👍 {} approved for case {}", stage, self.case_id);
                self.apply(WorkflowAction::update_step(
                    stage.as_str(),
                    StepStatus::Completed,
                    None,
                ));
                if let Some(next) = StepRegistry::next_stage(stage) {
                    self.apply(WorkflowAction::SetStage { stage: next });
                }
            }
            ReviewDecision::Reject { reason } => {
                tracing::info!("👎 {} rejected for case {}: {}", stage, self.case_id, reason);
                self.apply(WorkflowAction::update_step(
                    stage.as_str(),
                    StepStatus::Failed,
                    Some(reason),
                ));
            }
        }

        Ok(self.persist_snapshot())
    }

    /// Snapshot the current state as a named checkpoint
    pub async fn checkpoint(&self, label: Option<&str>) -> Result<String, SessionError> {
        Ok(self.checkpoints.create(&self.state, label).await?)
    }

    pub async fn checkpoints(&self) -> Result<Vec<CheckpointSummary>, SessionError> {
        Ok(self.checkpoints.list().await?)
    }

    /// Roll the live state back to a checkpoint
    pub async fn rewind(&mut self, checkpoint_id: &str) -> Result<PersistTicket, SessionError> {
        let patch = self
            .checkpoints
            .restore_from(checkpoint_id)
            .await?
            .ok_or_else(|| SessionError::CheckpointNotFound(checkpoint_id.to_string()))?;

        tracing::info!("⏪ Rewinding case {} to checkpoint {}", self.case_id, checkpoint_id);
        Ok(self.dispatch(WorkflowAction::RestoreState { patch }))
    }

    pub async fn has_recoverable(&self) -> Result<bool, SessionError> {
        Ok(self.gateway.has_recoverable().await?)
    }

    /// Drop the live record and reset to a fresh state; checkpoints are kept
    pub async fn discard(&mut self) -> Result<(), SessionError> {
        self.writer.clear().outcome().await?;
        self.state = WorkflowState::new();
        self.recovered = None;
        tracing::info!("🗑️ Discarded workflow run for case {}", self.case_id);
        Ok(())
    }

    /// Remove the live record and every checkpoint of the case
    pub async fn purge(&mut self) -> Result<(), SessionError> {
        self.writer.clear().outcome().await?;
        self.checkpoints.purge().await?;
        self.state = WorkflowState::new();
        self.recovered = None;
        Ok(())
    }

    fn apply(&mut self, action: WorkflowAction) {
        tracing::debug!("⚙️ Case {}: {}", self.case_id, action.name());
        let current = std::mem::take(&mut self.state);
        self.state = WorkflowStateMachine::reduce(current, action);
    }

    // A completed run has nothing to resume, so its live record is removed
    // instead of rewritten.
    fn persist_snapshot(&self) -> PersistTicket {
        if self.clear_on_complete && self.state.status == WorkflowStatus::Completed {
            self.writer.clear()
        } else {
            self.writer.persist(self.state.clone())
        }
    }
}
