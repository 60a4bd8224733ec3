/// Workflow State Layer
///
/// This module holds the in-memory side of the document pipeline:
/// - Type definitions (stages, steps, run state, partial state)
/// - The static stage registry
/// - The pure state machine and its action set

// Core workflow state type definitions
pub mod types;

// Ordered stage metadata and step template
pub mod registry;

// Pure reducer over workflow state
pub mod machine;

// Re-export commonly used types
pub use machine::{WorkflowAction, WorkflowStateMachine};
pub use registry::{StageDefinition, StageKind, StepRegistry};
pub use types::{
    StepStatus, WorkflowPatch, WorkflowStage, WorkflowState, WorkflowStatus, WorkflowStep,
};
