/// Core workflow state type definitions
///
/// Defines the pipeline stages, per-step tracking records, and the run-level
/// workflow state owned by a single case session. Everything here serializes
/// with serde so the same types flow through the API and into storage.

use crate::workflow::registry::StepRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A named phase of the document pipeline
///
/// The declaration order is the pipeline order. `PdfGeneration` is terminal and
/// has no tracked step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Upload,
    AiClassify,
    HacClassify,
    Ocr,
    FormPopulation,
    HacForms,
    AiVerify,
    HacVerify,
    PdfGeneration,
}

impl WorkflowStage {
    /// Every stage, in pipeline order
    pub const ALL: [WorkflowStage; 9] = [
        WorkflowStage::Upload,
        WorkflowStage::AiClassify,
        WorkflowStage::HacClassify,
        WorkflowStage::Ocr,
        WorkflowStage::FormPopulation,
        WorkflowStage::HacForms,
        WorkflowStage::AiVerify,
        WorkflowStage::HacVerify,
        WorkflowStage::PdfGeneration,
    ];

    /// Stable identifier used on the wire and in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::Upload => "upload",
            WorkflowStage::AiClassify => "ai_classify",
            WorkflowStage::HacClassify => "hac_classify",
            WorkflowStage::Ocr => "ocr",
            WorkflowStage::FormPopulation => "form_population",
            WorkflowStage::HacForms => "hac_forms",
            WorkflowStage::AiVerify => "ai_verify",
            WorkflowStage::HacVerify => "hac_verify",
            WorkflowStage::PdfGeneration => "pdf_generation",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known stage
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown workflow stage: {0}")]
pub struct UnknownStage(pub String);

impl FromStr for WorkflowStage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowStage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}

/// Status of an individual pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Run-level status, distinct from any individual step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Idle => "idle",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Paused => "paused",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }

    /// Whether a live record in this status describes an interrupted, resumable run
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Running | WorkflowStatus::Paused | WorkflowStatus::Failed
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known run status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown workflow status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for WorkflowStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(WorkflowStatus::Idle),
            "running" => Ok(WorkflowStatus::Running),
            "paused" => Ok(WorkflowStatus::Paused),
            "completed" => Ok(WorkflowStatus::Completed),
            "failed" => Ok(WorkflowStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Tracked unit of work for one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Stage this step tracks (never `pdf_generation`)
    pub id: WorkflowStage,
    /// Display label, opaque to the state machine
    pub title: String,
    pub status: StepStatus,
    /// Set only while `status` is `failed`
    #[serde(default)]
    pub error: Option<String>,
    /// Set exactly when the step transitioned into `completed`
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowStep {
    pub fn pending(id: WorkflowStage, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            status: StepStatus::Pending,
            error: None,
            completed_at: None,
        }
    }
}

/// In-memory workflow state for one case
///
/// Mutated only through `WorkflowStateMachine::reduce`. The `steps` list always
/// holds one entry per tracked stage, in pipeline order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub status: WorkflowStatus,
    pub current_stage: WorkflowStage,
    pub steps: Vec<WorkflowStep>,
    /// Operator-selected input documents (set semantics, deterministic iteration)
    pub selected_documents: BTreeSet<String>,
    /// Assigned at start, immutable for the lifetime of the run
    pub workflow_run_id: Option<String>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    /// Checked by the caller before a run may start
    pub has_consent: bool,
    /// Whether a file upload is in flight, independent of `status`
    pub is_uploading: bool,
}

impl WorkflowState {
    /// Fresh idle state with every step pending
    pub fn new() -> Self {
        Self {
            status: WorkflowStatus::Idle,
            current_stage: StepRegistry::first_stage(),
            steps: StepRegistry::initial_steps(),
            selected_documents: BTreeSet::new(),
            workflow_run_id: None,
            retry_count: 0,
            last_error: None,
            has_consent: false,
            is_uploading: false,
        }
    }

    /// Look up the step record tracking a stage
    pub fn step(&self, stage: WorkflowStage) -> Option<&WorkflowStep> {
        self.steps.iter().find(|step| step.id == stage)
    }

    /// Selected document ids as an ordered list, the storage representation
    pub fn selected_document_ids(&self) -> Vec<String> {
        self.selected_documents.iter().cloned().collect()
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial workflow state merged by `RESTORE_STATE`
///
/// Absent fields leave the current value untouched. The nullable fields use a
/// nested option so a patch can explicitly write `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<WorkflowStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<WorkflowStep>>,
    /// Stored as a list, converted back into a set on merge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_documents: Option<Vec<String>>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub workflow_run_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub last_error: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_consent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_uploading: Option<bool>,
}

// A present `null` becomes `Some(None)`; a missing key stays `None` via `default`.
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
