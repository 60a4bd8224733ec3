/// Static pipeline stage registry
///
/// The ordered list of pipeline stages and their display metadata. The state
/// machine consults it to build the fixed step list and to find the stage that
/// follows another. The table never changes at runtime.

use crate::workflow::types::{WorkflowStage, WorkflowStep};
use serde::Serialize;

/// Broad category of a stage, used by review handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Operator supplies documents
    Upload,
    /// AI/OCR service work
    Automated,
    /// HAC gate: a human must approve before the pipeline advances
    HumanReview,
    /// Final output stage, no tracked step
    Terminal,
}

/// Display metadata for one stage
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StageDefinition {
    pub id: WorkflowStage,
    pub title: &'static str,
    pub description: &'static str,
    pub kind: StageKind,
}

impl StageDefinition {
    /// Whether this stage has a tracked step record
    pub fn has_step(&self) -> bool {
        self.kind != StageKind::Terminal
    }
}

// Indexed by `WorkflowStage as usize`; order must match `WorkflowStage::ALL`.
static STAGES: [StageDefinition; 9] = [
    StageDefinition {
        id: WorkflowStage::Upload,
        title: "Document Upload",
        description: "Collect and select the case documents to process",
        kind: StageKind::Upload,
    },
    StageDefinition {
        id: WorkflowStage::AiClassify,
        title: "AI Classification",
        description: "Classify each document by type",
        kind: StageKind::Automated,
    },
    StageDefinition {
        id: WorkflowStage::HacClassify,
        title: "Review Classification",
        description: "Operator confirms or corrects document classifications",
        kind: StageKind::HumanReview,
    },
    StageDefinition {
        id: WorkflowStage::Ocr,
        title: "OCR Extraction",
        description: "Extract text and fields from the classified documents",
        kind: StageKind::Automated,
    },
    StageDefinition {
        id: WorkflowStage::FormPopulation,
        title: "Form Population",
        description: "Fill application forms from the extracted data",
        kind: StageKind::Automated,
    },
    StageDefinition {
        id: WorkflowStage::HacForms,
        title: "Review Forms",
        description: "Operator reviews the populated forms",
        kind: StageKind::HumanReview,
    },
    StageDefinition {
        id: WorkflowStage::AiVerify,
        title: "AI Verification",
        description: "Cross-check form answers against the source documents",
        kind: StageKind::Automated,
    },
    StageDefinition {
        id: WorkflowStage::HacVerify,
        title: "Final Review",
        description: "Operator signs off on the verified forms",
        kind: StageKind::HumanReview,
    },
    StageDefinition {
        id: WorkflowStage::PdfGeneration,
        title: "PDF Generation",
        description: "Render the final form data into PDF documents",
        kind: StageKind::Terminal,
    },
];

/// Lookup functions over the static stage table
pub struct StepRegistry;

impl StepRegistry {
    /// Number of tracked steps (every stage except the terminal one)
    pub const STEP_COUNT: usize = 8;

    pub fn stages() -> &'static [StageDefinition] {
        &STAGES
    }

    pub fn definition(stage: WorkflowStage) -> &'static StageDefinition {
        &STAGES[Self::position(stage)]
    }

    /// Zero-based position of a stage in the pipeline
    pub fn position(stage: WorkflowStage) -> usize {
        stage as usize
    }

    pub fn first_stage() -> WorkflowStage {
        STAGES[0].id
    }

    pub fn next_stage(stage: WorkflowStage) -> Option<WorkflowStage> {
        STAGES.get(Self::position(stage) + 1).map(|def| def.id)
    }

    pub fn previous_stage(stage: WorkflowStage) -> Option<WorkflowStage> {
        Self::position(stage)
            .checked_sub(1)
            .map(|index| STAGES[index].id)
    }

    /// Step list for a fresh workflow: one pending entry per tracked stage
    pub fn initial_steps() -> Vec<WorkflowStep> {
        STAGES
            .iter()
            .filter(|def| def.has_step())
            .map(|def| WorkflowStep::pending(def.id, def.title))
            .collect()
    }
}
