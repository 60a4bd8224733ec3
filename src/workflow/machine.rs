/// Workflow state machine
///
/// A pure transition function over `WorkflowState`. No I/O and no clock reads:
/// time-dependent actions carry their timestamp, so replaying the same action
/// log over the same state always yields the same result.

use crate::workflow::registry::StepRegistry;
use crate::workflow::types::{
    StepStatus, WorkflowPatch, WorkflowStage, WorkflowState, WorkflowStatus, WorkflowStep,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of mutations a workflow state accepts
///
/// Serialized with a `type` tag, e.g. `{"type":"SET_STAGE","stage":"ocr"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowAction {
    /// Begin a run; callers guard consent, document selection and double-start
    StartWorkflow { run_id: String },
    PauseWorkflow,
    ResumeWorkflow,
    CompleteWorkflow,
    FailWorkflow { error: String },
    /// Resume at the current stage with a bumped retry counter
    RetryWorkflow,
    /// Move to any stage; reachability is the caller's concern
    SetStage { stage: WorkflowStage },
    /// Replace one step's status; unknown ids are ignored
    UpdateStep {
        step_id: String,
        status: StepStatus,
        #[serde(default)]
        error: Option<String>,
        /// When the update happened, stamped on construction
        #[serde(default = "Utc::now")]
        at: DateTime<Utc>,
    },
    SelectDocument { id: String },
    DeselectDocument { id: String },
    /// Replace the selection wholesale
    SelectAllDocuments { ids: Vec<String> },
    DeselectAllDocuments,
    SetConsent { value: bool },
    SetUploading { value: bool },
    /// Shallow merge of a partial state, used by recovery and rewind
    RestoreState { patch: WorkflowPatch },
}

impl WorkflowAction {
    /// Step update stamped with the current time
    pub fn update_step(
        step_id: impl Into<String>,
        status: StepStatus,
        error: Option<String>,
    ) -> Self {
        WorkflowAction::UpdateStep {
            step_id: step_id.into(),
            status,
            error,
            at: Utc::now(),
        }
    }

    /// Short name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowAction::StartWorkflow { .. } => "START_WORKFLOW",
            WorkflowAction::PauseWorkflow => "PAUSE_WORKFLOW",
            WorkflowAction::ResumeWorkflow => "RESUME_WORKFLOW",
            WorkflowAction::CompleteWorkflow => "COMPLETE_WORKFLOW",
            WorkflowAction::FailWorkflow { .. } => "FAIL_WORKFLOW",
            WorkflowAction::RetryWorkflow => "RETRY_WORKFLOW",
            WorkflowAction::SetStage { .. } => "SET_STAGE",
            WorkflowAction::UpdateStep { .. } => "UPDATE_STEP",
            WorkflowAction::SelectDocument { .. } => "SELECT_DOCUMENT",
            WorkflowAction::DeselectDocument { .. } => "DESELECT_DOCUMENT",
            WorkflowAction::SelectAllDocuments { .. } => "SELECT_ALL_DOCUMENTS",
            WorkflowAction::DeselectAllDocuments => "DESELECT_ALL_DOCUMENTS",
            WorkflowAction::SetConsent { .. } => "SET_CONSENT",
            WorkflowAction::SetUploading { .. } => "SET_UPLOADING",
            WorkflowAction::RestoreState { .. } => "RESTORE_STATE",
        }
    }
}

/// Transition function for workflow state
pub struct WorkflowStateMachine;

impl WorkflowStateMachine {
    /// Apply one action and return the next state
    ///
    /// Never fails and never reorders or resizes `steps`. PAUSE and RESUME are
    /// accepted from any status.
    pub fn reduce(mut state: WorkflowState, action: WorkflowAction) -> WorkflowState {
        match action {
            WorkflowAction::StartWorkflow { run_id } => {
                state.status = WorkflowStatus::Running;
                state.workflow_run_id = Some(run_id);
                state.current_stage = StepRegistry::next_stage(WorkflowStage::Upload)
                    .unwrap_or(WorkflowStage::AiClassify);
                state.last_error = None;
            }
            WorkflowAction::PauseWorkflow => {
                state.status = WorkflowStatus::Paused;
            }
            WorkflowAction::ResumeWorkflow => {
                state.status = WorkflowStatus::Running;
            }
            WorkflowAction::CompleteWorkflow => {
                state.status = WorkflowStatus::Completed;
                state.last_error = None;
            }
            WorkflowAction::FailWorkflow { error } => {
                state.status = WorkflowStatus::Failed;
                state.last_error = Some(error);
            }
            WorkflowAction::RetryWorkflow => {
                state.status = WorkflowStatus::Running;
                state.retry_count = state.retry_count.saturating_add(1);
                state.last_error = None;
            }
            WorkflowAction::SetStage { stage } => {
                state.current_stage = stage;
            }
            WorkflowAction::UpdateStep {
                step_id,
                status,
                error,
                at,
            } => {
                let target = step_id.parse::<WorkflowStage>().ok();
                if let Some(step) = state.steps.iter_mut().find(|s| Some(s.id) == target) {
                    step.status = status;
                    step.error = if status == StepStatus::Failed { error } else { None };
                    step.completed_at = (status == StepStatus::Completed).then_some(at);
                }
            }
            WorkflowAction::SelectDocument { id } => {
                state.selected_documents.insert(id);
            }
            WorkflowAction::DeselectDocument { id } => {
                state.selected_documents.remove(&id);
            }
            WorkflowAction::SelectAllDocuments { ids } => {
                state.selected_documents = ids.into_iter().collect();
            }
            WorkflowAction::DeselectAllDocuments => {
                state.selected_documents.clear();
            }
            WorkflowAction::SetConsent { value } => {
                state.has_consent = value;
            }
            WorkflowAction::SetUploading { value } => {
                state.is_uploading = value;
            }
            WorkflowAction::RestoreState { patch } => {
                state = merge_patch(state, patch);
            }
        }
        state
    }

    /// Fold an action log over a starting state
    pub fn replay<I>(state: WorkflowState, actions: I) -> WorkflowState
    where
        I: IntoIterator<Item = WorkflowAction>,
    {
        actions.into_iter().fold(state, Self::reduce)
    }
}

fn merge_patch(mut state: WorkflowState, patch: WorkflowPatch) -> WorkflowState {
    if let Some(status) = patch.status {
        state.status = status;
    }
    if let Some(stage) = patch.current_stage {
        state.current_stage = stage;
    }
    if let Some(steps) = patch.steps {
        state.steps = align_steps(steps);
    }
    if let Some(ids) = patch.selected_documents {
        state.selected_documents = ids.into_iter().collect();
    }
    if let Some(run_id) = patch.workflow_run_id {
        state.workflow_run_id = run_id;
    }
    if let Some(retry_count) = patch.retry_count {
        state.retry_count = retry_count;
    }
    if let Some(last_error) = patch.last_error {
        state.last_error = last_error;
    }
    if let Some(has_consent) = patch.has_consent {
        state.has_consent = has_consent;
    }
    if let Some(is_uploading) = patch.is_uploading {
        state.is_uploading = is_uploading;
    }
    state
}

// Restored steps are matched onto the registry template by id, so a stale or
// truncated stored list can never change cardinality or order.
fn align_steps(mut restored: Vec<WorkflowStep>) -> Vec<WorkflowStep> {
    StepRegistry::initial_steps()
        .into_iter()
        .map(|template| {
            match restored.iter().position(|step| step.id == template.id) {
                Some(index) => restored.swap_remove(index),
                None => template,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reduce(state: WorkflowState, action: WorkflowAction) -> WorkflowState {
        WorkflowStateMachine::reduce(state, action)
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
    }

    #[test]
    fn start_moves_to_classification() {
        let state = reduce(
            WorkflowState::new(),
            WorkflowAction::StartWorkflow {
                run_id: "run-1".into(),
            },
        );
        assert_eq!(state.status, WorkflowStatus::Running);
        assert_eq!(state.current_stage, WorkflowStage::AiClassify);
        assert_eq!(state.workflow_run_id.as_deref(), Some("run-1"));
        assert_eq!(state.last_error, None);
    }

    #[test]
    fn second_start_overwrites_run_id() {
        let state = WorkflowStateMachine::replay(
            WorkflowState::new(),
            vec![
                WorkflowAction::StartWorkflow { run_id: "a".into() },
                WorkflowAction::StartWorkflow { run_id: "b".into() },
            ],
        );
        assert_eq!(state.workflow_run_id.as_deref(), Some("b"));
    }

    #[test]
    fn completing_a_step_stamps_completed_at() {
        let before = WorkflowState::new();
        let after = reduce(
            before.clone(),
            WorkflowAction::UpdateStep {
                step_id: "ocr".into(),
                status: StepStatus::Completed,
                error: None,
                at: fixed_time(),
            },
        );

        let ocr = after.step(WorkflowStage::Ocr).unwrap();
        assert_eq!(ocr.status, StepStatus::Completed);
        assert_eq!(ocr.completed_at, Some(fixed_time()));

        for (old, new) in before.steps.iter().zip(after.steps.iter()) {
            if new.id != WorkflowStage::Ocr {
                assert_eq!(old, new);
            }
        }
    }

    #[test]
    fn leaving_completed_clears_completed_at() {
        let state = WorkflowStateMachine::replay(
            WorkflowState::new(),
            vec![
                WorkflowAction::update_step("ocr", StepStatus::Completed, None),
                WorkflowAction::update_step("ocr", StepStatus::Processing, None),
            ],
        );
        let ocr = state.step(WorkflowStage::Ocr).unwrap();
        assert_eq!(ocr.status, StepStatus::Processing);
        assert_eq!(ocr.completed_at, None);
    }

    #[test]
    fn step_error_is_kept_only_for_failures() {
        let failed = reduce(
            WorkflowState::new(),
            WorkflowAction::update_step("ai_verify", StepStatus::Failed, Some("mismatch".into())),
        );
        assert_eq!(
            failed.step(WorkflowStage::AiVerify).unwrap().error.as_deref(),
            Some("mismatch")
        );

        let recovered = reduce(
            failed,
            WorkflowAction::update_step("ai_verify", StepStatus::Processing, Some("stale".into())),
        );
        assert_eq!(recovered.step(WorkflowStage::AiVerify).unwrap().error, None);
    }

    #[test]
    fn unknown_step_id_is_ignored() {
        let before = WorkflowState::new();
        let after = reduce(
            before.clone(),
            WorkflowAction::update_step("nonexistent", StepStatus::Failed, Some("x".into())),
        );
        assert_eq!(after.steps, before.steps);
        assert_eq!(after, before);
    }

    #[test]
    fn pdf_generation_has_no_step_to_update() {
        let before = WorkflowState::new();
        let after = reduce(
            before.clone(),
            WorkflowAction::update_step("pdf_generation", StepStatus::Completed, None),
        );
        assert_eq!(after.steps, before.steps);
    }

    #[test]
    fn select_all_replaces_rather_than_unions() {
        let state = WorkflowStateMachine::replay(
            WorkflowState::new(),
            vec![
                WorkflowAction::SelectAllDocuments {
                    ids: vec!["a".into(), "b".into()],
                },
                WorkflowAction::SelectAllDocuments {
                    ids: vec!["c".into()],
                },
            ],
        );
        assert_eq!(state.selected_document_ids(), vec!["c".to_string()]);
    }

    #[test]
    fn document_selection_is_idempotent() {
        let once = reduce(
            WorkflowState::new(),
            WorkflowAction::SelectDocument { id: "doc-1".into() },
        );
        let twice = reduce(
            once.clone(),
            WorkflowAction::SelectDocument { id: "doc-1".into() },
        );
        assert_eq!(once, twice);

        let absent = reduce(
            twice.clone(),
            WorkflowAction::DeselectDocument { id: "doc-9".into() },
        );
        assert_eq!(absent, twice);

        let cleared = reduce(absent, WorkflowAction::DeselectAllDocuments);
        assert!(cleared.selected_documents.is_empty());
    }

    #[test]
    fn retry_after_failure_resumes_in_place() {
        let failed = WorkflowStateMachine::replay(
            WorkflowState::new(),
            vec![
                WorkflowAction::StartWorkflow { run_id: "r".into() },
                WorkflowAction::SetStage {
                    stage: WorkflowStage::Ocr,
                },
                WorkflowAction::FailWorkflow {
                    error: "ocr timeout".into(),
                },
            ],
        );
        assert_eq!(failed.status, WorkflowStatus::Failed);
        assert_eq!(failed.last_error.as_deref(), Some("ocr timeout"));

        let retried = reduce(failed.clone(), WorkflowAction::RetryWorkflow);
        assert_eq!(retried.status, WorkflowStatus::Running);
        assert_eq!(retried.last_error, None);
        assert_eq!(retried.retry_count, failed.retry_count + 1);
        assert_eq!(retried.current_stage, WorkflowStage::Ocr);
        assert_eq!(retried.steps, failed.steps);
    }

    #[test]
    fn pause_and_resume_are_accepted_from_any_status() {
        let completed = reduce(WorkflowState::new(), WorkflowAction::CompleteWorkflow);
        let paused = reduce(completed, WorkflowAction::PauseWorkflow);
        assert_eq!(paused.status, WorkflowStatus::Paused);

        let idle_resumed = reduce(WorkflowState::new(), WorkflowAction::ResumeWorkflow);
        assert_eq!(idle_resumed.status, WorkflowStatus::Running);
    }

    #[test]
    fn complete_clears_last_error() {
        let state = WorkflowStateMachine::replay(
            WorkflowState::new(),
            vec![
                WorkflowAction::FailWorkflow { error: "x".into() },
                WorkflowAction::CompleteWorkflow,
            ],
        );
        assert_eq!(state.status, WorkflowStatus::Completed);
        assert_eq!(state.last_error, None);
    }

    #[test]
    fn consent_and_upload_flags_are_direct_writes() {
        let state = WorkflowStateMachine::replay(
            WorkflowState::new(),
            vec![
                WorkflowAction::SetConsent { value: true },
                WorkflowAction::SetUploading { value: true },
            ],
        );
        assert!(state.has_consent);
        assert!(state.is_uploading);
        assert_eq!(state.status, WorkflowStatus::Idle);
    }

    #[test]
    fn restore_merges_only_present_fields() {
        let base = WorkflowStateMachine::replay(
            WorkflowState::new(),
            vec![
                WorkflowAction::SelectDocument { id: "keep".into() },
                WorkflowAction::SetConsent { value: true },
            ],
        );
        let patch = WorkflowPatch {
            status: Some(WorkflowStatus::Paused),
            current_stage: Some(WorkflowStage::HacForms),
            retry_count: Some(4),
            last_error: Some(Some("boom".into())),
            ..WorkflowPatch::default()
        };

        let restored = reduce(base, WorkflowAction::RestoreState { patch });
        assert_eq!(restored.status, WorkflowStatus::Paused);
        assert_eq!(restored.current_stage, WorkflowStage::HacForms);
        assert_eq!(restored.retry_count, 4);
        assert_eq!(restored.last_error.as_deref(), Some("boom"));
        assert!(restored.has_consent);
        assert_eq!(restored.selected_document_ids(), vec!["keep".to_string()]);
    }

    #[test]
    fn restore_converts_document_list_into_set() {
        let patch = WorkflowPatch {
            selected_documents: Some(vec!["b".into(), "a".into(), "b".into()]),
            ..WorkflowPatch::default()
        };
        let restored = reduce(WorkflowState::new(), WorkflowAction::RestoreState { patch });
        assert_eq!(
            restored.selected_document_ids(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn restore_realigns_truncated_step_lists() {
        let mut ocr = WorkflowStep::pending(WorkflowStage::Ocr, "OCR Extraction");
        ocr.status = StepStatus::Completed;
        ocr.completed_at = Some(fixed_time());
        let upload = WorkflowStep::pending(WorkflowStage::Upload, "Document Upload");

        let patch = WorkflowPatch {
            steps: Some(vec![ocr.clone(), upload]),
            ..WorkflowPatch::default()
        };
        let restored = reduce(WorkflowState::new(), WorkflowAction::RestoreState { patch });

        assert_eq!(restored.steps.len(), StepRegistry::STEP_COUNT);
        assert_eq!(restored.steps[0].id, WorkflowStage::Upload);
        assert_eq!(restored.step(WorkflowStage::Ocr), Some(&ocr));
        assert_eq!(
            restored.step(WorkflowStage::HacVerify).unwrap().status,
            StepStatus::Pending
        );
    }

    #[test]
    fn actions_deserialize_from_tagged_json() {
        let action: WorkflowAction = serde_json::from_str(
            r#"{ "type": "UPDATE_STEP", "step_id": "ocr", "status": "failed", "error": "blurry" }"#,
        )
        .unwrap();
        match action {
            WorkflowAction::UpdateStep {
                step_id,
                status,
                error,
                ..
            } => {
                assert_eq!(step_id, "ocr");
                assert_eq!(status, StepStatus::Failed);
                assert_eq!(error.as_deref(), Some("blurry"));
            }
            other => panic!("unexpected action: {other:?}"),
        }

        let pause: WorkflowAction = serde_json::from_str(r#"{ "type": "PAUSE_WORKFLOW" }"#).unwrap();
        assert_eq!(pause, WorkflowAction::PauseWorkflow);
    }

    mod properties {
        use super::*;
        use proptest::collection::vec;
        use proptest::prelude::*;

        fn stage() -> impl Strategy<Value = WorkflowStage> {
            (0..WorkflowStage::ALL.len()).prop_map(|i| WorkflowStage::ALL[i])
        }

        fn step_status() -> impl Strategy<Value = StepStatus> {
            prop_oneof![
                Just(StepStatus::Pending),
                Just(StepStatus::Processing),
                Just(StepStatus::Completed),
                Just(StepStatus::Failed),
            ]
        }

        fn step_id() -> impl Strategy<Value = String> {
            prop_oneof![
                stage().prop_map(|s| s.as_str().to_string()),
                "[a-z_]{1,12}",
            ]
        }

        fn doc_id() -> impl Strategy<Value = String> {
            "doc-[a-d]"
        }

        // Everything except RESTORE_STATE, which may overwrite retry_count.
        fn action() -> impl Strategy<Value = WorkflowAction> {
            prop_oneof![
                "run-[0-9]{1,3}".prop_map(|run_id| WorkflowAction::StartWorkflow { run_id }),
                Just(WorkflowAction::PauseWorkflow),
                Just(WorkflowAction::ResumeWorkflow),
                Just(WorkflowAction::CompleteWorkflow),
                "[a-z ]{0,10}".prop_map(|error| WorkflowAction::FailWorkflow { error }),
                Just(WorkflowAction::RetryWorkflow),
                stage().prop_map(|stage| WorkflowAction::SetStage { stage }),
                (step_id(), step_status(), proptest::option::of("[a-z]{1,6}")).prop_map(
                    |(step_id, status, error)| WorkflowAction::UpdateStep {
                        step_id,
                        status,
                        error,
                        at: fixed_time(),
                    }
                ),
                doc_id().prop_map(|id| WorkflowAction::SelectDocument { id }),
                doc_id().prop_map(|id| WorkflowAction::DeselectDocument { id }),
                vec(doc_id(), 0..4).prop_map(|ids| WorkflowAction::SelectAllDocuments { ids }),
                Just(WorkflowAction::DeselectAllDocuments),
                any::<bool>().prop_map(|value| WorkflowAction::SetConsent { value }),
                any::<bool>().prop_map(|value| WorkflowAction::SetUploading { value }),
            ]
        }

        proptest! {
            #[test]
            fn reduce_is_deterministic(actions in vec(action(), 0..30), next in action()) {
                let state = WorkflowStateMachine::replay(WorkflowState::new(), actions);
                let first = WorkflowStateMachine::reduce(state.clone(), next.clone());
                let second = WorkflowStateMachine::reduce(state, next);
                prop_assert_eq!(first, second);
            }

            #[test]
            fn steps_keep_fixed_ids_and_order(actions in vec(action(), 0..40)) {
                let state = WorkflowStateMachine::replay(WorkflowState::new(), actions);
                let ids: Vec<WorkflowStage> = state.steps.iter().map(|s| s.id).collect();
                let expected: Vec<WorkflowStage> =
                    StepRegistry::initial_steps().iter().map(|s| s.id).collect();
                prop_assert_eq!(state.steps.len(), StepRegistry::STEP_COUNT);
                prop_assert_eq!(ids, expected);
            }

            #[test]
            fn retry_count_counts_retries(actions in vec(action(), 0..40)) {
                let retries = actions
                    .iter()
                    .filter(|a| matches!(a, WorkflowAction::RetryWorkflow))
                    .count() as u32;
                let state = WorkflowStateMachine::replay(WorkflowState::new(), actions);
                prop_assert_eq!(state.retry_count, retries);
            }

            #[test]
            fn selecting_twice_equals_selecting_once(actions in vec(action(), 0..20), id in doc_id()) {
                let state = WorkflowStateMachine::replay(WorkflowState::new(), actions);
                let once = WorkflowStateMachine::reduce(
                    state,
                    WorkflowAction::SelectDocument { id: id.clone() },
                );
                let twice = WorkflowStateMachine::reduce(
                    once.clone(),
                    WorkflowAction::SelectDocument { id },
                );
                prop_assert_eq!(once, twice);
            }
        }
    }
}
