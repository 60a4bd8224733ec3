/// Durable Storage Layer
///
/// SQLite persistence for workflow state, via sqlx:
/// - Database bootstrap and schema
/// - Versioned row shapes
/// - The live-record gateway (one upserted row per case)
/// - The checkpoint store (insert-only snapshots)

// Pool creation and schema
pub mod database;

// Row structs and state <-> row translation
pub mod records;

// Live workflow record per case
pub mod gateway;

// Immutable labeled snapshots
pub mod checkpoints;

pub use checkpoints::CheckpointStore;
pub use gateway::PersistenceGateway;
pub use records::{CheckpointSummary, SCHEMA_VERSION};
