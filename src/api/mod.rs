/// HTTP API Layer
///
/// This module provides the REST API endpoints for case workflows. It handles:
/// - Session open/close (with recovery on open)
/// - Workflow actions, guarded start, and human review verdicts
/// - Checkpoint creation, listing, and rewind
/// - Stage registry listing

// Case session and workflow endpoints
pub mod cases;

// Checkpoint endpoints
pub mod checkpoints;

// Stage registry endpoint
pub mod stages;

// Re-export router builders
pub use cases::{create_case_routes, AppState};
pub use checkpoints::create_checkpoint_routes;
pub use stages::create_stage_routes;
