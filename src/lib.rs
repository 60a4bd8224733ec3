/// Docflow: resumable document-processing workflow orchestrator
///
/// This library provides the case workflow core: a pure state machine over the
/// document pipeline, durable live records and checkpoints in SQLite, session
/// recovery, and an HTTP API for operator actions.

// Core configuration and setup
pub mod config;

// Storage and session error types
pub mod error;

// Workflow state layer - stages, steps, and the pure state machine
pub mod workflow;

// Durable storage layer - live records and checkpoints
pub mod persistence;

// Session-start recovery protocol
pub mod recovery;

// Case sessions - single owner per case, persistence side effects
pub mod session;

// HTTP API layer - REST endpoints for case workflows
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use error::{SessionError, StoreError};
pub use persistence::{CheckpointStore, PersistenceGateway};
pub use recovery::{LiveRecordSource, RecoveryCoordinator, RecoveryOutcome, RecoverySummary};
pub use server::{build_router, start_server};
pub use session::{CaseSession, SessionManager};
pub use workflow::{WorkflowAction, WorkflowState, WorkflowStateMachine};
