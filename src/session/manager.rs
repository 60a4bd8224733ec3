/// Open case sessions
///
/// Maps case ids to their live session. Each session sits behind its own
/// mutex, so exactly one logical owner mutates a case's workflow at a time
/// while different cases proceed independently.

use crate::config::WorkflowConfig;
use crate::error::SessionError;
use crate::persistence::{CheckpointStore, PersistenceGateway};
use crate::session::case::CaseSession;
use sqlx::sqlite::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Shared handle to one open case session
pub type SharedSession = Arc<Mutex<CaseSession>>;

/// Registry of open case sessions
#[derive(Debug)]
pub struct SessionManager {
    /// Workflow database shared by all sessions
    pool: SqlitePool,
    config: WorkflowConfig,
    /// Open sessions keyed by case id
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl SessionManager {
    pub fn new(pool: SqlitePool, config: WorkflowConfig) -> Self {
        Self {
            pool,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Get the open session for a case, opening (and recovering) it if needed
    pub async fn open(&self, case_id: &str) -> SharedSession {
        // Try read lock first (fast path for open sessions)
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(case_id) {
                return Arc::clone(session);
            }
        }

        let mut sessions = self.sessions.write().await;

        // Double-check: another request may have opened it meanwhile
        if let Some(session) = sessions.get(case_id) {
            return Arc::clone(session);
        }

        let session = CaseSession::open(case_id, self.pool.clone(), &self.config).await;
        let session = Arc::new(Mutex::new(session));
        sessions.insert(case_id.to_string(), Arc::clone(&session));

        session
    }

    /// The open session for a case, if any
    pub async fn get(&self, case_id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(case_id).cloned()
    }

    /// Forget the in-memory session; durable state is untouched
    pub async fn close(&self, case_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(case_id).is_some();
        if removed {
            tracing::info!("📁 Closed workflow session for case {}", case_id);
        }
        removed
    }

    /// Close the session and delete the case's live record and checkpoints
    ///
    /// A closed case is purged straight from storage without running recovery.
    pub async fn purge(&self, case_id: &str) -> Result<(), SessionError> {
        let open = self.sessions.write().await.remove(case_id);

        match open {
            // Its writer clears behind any queued writes
            Some(session) => {
                let mut session = session.lock().await;
                session.purge().await?;
            }
            None => {
                PersistenceGateway::new(self.pool.clone(), case_id)
                    .clear()
                    .await?;
                CheckpointStore::new(
                    self.pool.clone(),
                    case_id,
                    self.config.checkpoint_list_limit,
                )
                .purge()
                .await?;
            }
        }

        tracing::info!("🧹 Purged workflow data for case {}", case_id);
        Ok(())
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
