/// Case Session Layer
///
/// The side-effect layer around the pure state machine:
/// - `CaseSession` owns one case's state and schedules persistence
/// - `SessionManager` keeps one session per open case
/// - `PersistTicket` reports the outcome of a queued live-record write

pub mod case;
pub mod manager;
pub mod writer;

pub use case::{CaseSession, ReviewDecision};
pub use writer::PersistTicket;
pub use manager::{SessionManager, SharedSession};
