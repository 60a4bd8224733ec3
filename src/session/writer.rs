/// Ordered live-record writes for one case
///
/// Every write a session makes to its live record (persist or clear) is queued
/// on one channel and drained by a single task, so writes land in the order
/// they were issued and a clear is never overtaken by an older persist.

use crate::error::StoreError;
use crate::persistence::PersistenceGateway;
use crate::workflow::WorkflowState;
use tokio::sync::{mpsc, oneshot};

/// Handle to a queued live-record write
///
/// Await `outcome` to observe durability, or drop it: the write still runs and
/// logs its own failure.
#[derive(Debug)]
pub struct PersistTicket {
    receiver: oneshot::Receiver<Result<(), StoreError>>,
}

impl PersistTicket {
    pub async fn outcome(self) -> Result<(), StoreError> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Task("workflow writer stopped".to_string())),
        }
    }
}

enum WriteOp {
    Persist(WorkflowState),
    Clear,
}

struct WriteJob {
    op: WriteOp,
    reply: oneshot::Sender<Result<(), StoreError>>,
}

/// Sending half of a case's write queue
///
/// The draining task stops once the writer is dropped and the queue is empty,
/// so writes issued just before a session closes still reach storage.
#[derive(Debug)]
pub(crate) struct RecordWriter {
    sender: mpsc::UnboundedSender<WriteJob>,
}

impl RecordWriter {
    pub(crate) fn spawn(gateway: PersistenceGateway) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<WriteJob>();

        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let result = match job.op {
                    WriteOp::Persist(state) => gateway.persist(&state, None).await,
                    WriteOp::Clear => gateway.clear().await.map(|_| ()),
                };
                // Nobody is waiting when the ticket was dropped
                let _ = job.reply.send(result);
            }
            tracing::debug!("📭 Workflow writer for case {} stopped", gateway.case_id());
        });

        Self { sender }
    }

    /// Queue an upsert of the given state
    pub(crate) fn persist(&self, state: WorkflowState) -> PersistTicket {
        self.submit(WriteOp::Persist(state))
    }

    /// Queue deletion of the live record
    pub(crate) fn clear(&self) -> PersistTicket {
        self.submit(WriteOp::Clear)
    }

    fn submit(&self, op: WriteOp) -> PersistTicket {
        let (reply, receiver) = oneshot::channel();
        if self.sender.send(WriteJob { op, reply }).is_err() {
            // The job (and its reply sender) is dropped, so the ticket reports a task error
            tracing::warn!("⚠️ Workflow writer is gone, write was not queued");
        }
        PersistTicket { receiver }
    }
}
