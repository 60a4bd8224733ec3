/// Session-start recovery
///
/// Decides, before any action is dispatched, whether a case has an interrupted
/// run worth resuming and seeds the initial state from the live record. Every
/// failure path falls back to a fresh state: recovery must never block a
/// session from opening.

use crate::error::StoreError;
use crate::persistence::PersistenceGateway;
use crate::workflow::{
    WorkflowAction, WorkflowPatch, WorkflowStage, WorkflowState, WorkflowStateMachine,
    WorkflowStatus,
};
use async_trait::async_trait;
use serde::Serialize;

/// Where recovery reads a case's live record from
///
/// The two calls are separate so a caller can show a resume prompt before
/// loading; the record may change or vanish between them.
#[async_trait]
pub trait LiveRecordSource: Send + Sync {
    fn case_id(&self) -> &str;

    /// Whether the live record describes an interrupted run
    async fn has_recoverable(&self) -> Result<bool, StoreError>;

    /// The live record as a partial state, if one exists
    async fn restore(&self) -> Result<Option<WorkflowPatch>, StoreError>;
}

#[async_trait]
impl LiveRecordSource for PersistenceGateway {
    fn case_id(&self) -> &str {
        PersistenceGateway::case_id(self)
    }

    async fn has_recoverable(&self) -> Result<bool, StoreError> {
        PersistenceGateway::has_recoverable(self).await
    }

    async fn restore(&self) -> Result<Option<WorkflowPatch>, StoreError> {
        PersistenceGateway::restore(self).await
    }
}

/// What the operator is told about a recovered run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoverySummary {
    pub workflow_run_id: Option<String>,
    pub status: WorkflowStatus,
    pub current_stage: WorkflowStage,
    pub last_error: Option<String>,
}

impl RecoverySummary {
    fn of(state: &WorkflowState) -> Self {
        Self {
            workflow_run_id: state.workflow_run_id.clone(),
            status: state.status,
            current_stage: state.current_stage,
            last_error: state.last_error.clone(),
        }
    }
}

/// Result of the recovery protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Nothing to resume; start from an idle state
    Fresh(WorkflowState),
    /// A live record was restored into the state
    Restored {
        state: WorkflowState,
        summary: RecoverySummary,
    },
}

impl RecoveryOutcome {
    pub fn into_parts(self) -> (WorkflowState, Option<RecoverySummary>) {
        match self {
            RecoveryOutcome::Fresh(state) => (state, None),
            RecoveryOutcome::Restored { state, summary } => (state, Some(summary)),
        }
    }
}

/// Runs the recovery protocol against one case's live record
pub struct RecoveryCoordinator<'a> {
    source: &'a dyn LiveRecordSource,
}

impl<'a> RecoveryCoordinator<'a> {
    pub fn new(source: &'a dyn LiveRecordSource) -> Self {
        Self { source }
    }

    /// Check for a recoverable run, then load it
    ///
    /// Only state is restored; in-flight service calls are not resumed.
    pub async fn recover(&self) -> RecoveryOutcome {
        let case_id = self.source.case_id();

        match self.source.has_recoverable().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("🆕 No recoverable workflow for case {}", case_id);
                return RecoveryOutcome::Fresh(WorkflowState::new());
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ Recovery check failed for case {}, starting fresh: {}",
                    case_id,
                    e
                );
                return RecoveryOutcome::Fresh(WorkflowState::new());
            }
        }

        let patch = match self.source.restore().await {
            Ok(Some(patch)) => patch,
            Ok(None) => {
                tracing::warn!(
                    "⚠️ Recoverable workflow for case {} vanished before restore, starting fresh",
                    case_id
                );
                return RecoveryOutcome::Fresh(WorkflowState::new());
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ Could not restore workflow for case {}, starting fresh: {}",
                    case_id,
                    e
                );
                return RecoveryOutcome::Fresh(WorkflowState::new());
            }
        };

        let state = WorkflowStateMachine::reduce(
            WorkflowState::new(),
            WorkflowAction::RestoreState { patch },
        );
        let summary = RecoverySummary::of(&state);

        tracing::info!(
            "♻️ Recovered workflow for case {} (run: {}, status: {}, stage: {})",
            case_id,
            summary.workflow_run_id.as_deref().unwrap_or("none"),
            summary.status,
            summary.current_stage
        );
        if let Some(error) = &summary.last_error {
            tracing::info!("♻️ Recovered run last failed with: {}", error);
        }

        RecoveryOutcome::Restored { state, summary }
    }
}
