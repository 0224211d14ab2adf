//! Queue-backed audit sink that keeps delivery off the request path.

use super::{AuditRecord, AuditSink};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Default number of records buffered before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

enum Command {
    Record(Box<AuditRecord>),
    Flush(oneshot::Sender<()>),
}

/// Forwards records to an inner sink from a spawned task.
///
/// [`AuditSink::record`] only enqueues, so a slow or failing inner sink never
/// delays verification. When the queue is full the record is dropped and the
/// call reports an error, which the verifier logs and ignores.
pub struct BackgroundAuditSink {
    sender: mpsc::Sender<Command>,
}

impl BackgroundAuditSink {
    /// Spawn the delivery task on the current tokio runtime.
    #[must_use]
    pub fn spawn(inner: Arc<dyn AuditSink>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel(capacity.max(1));

        tokio::spawn(async move {
            while let Some(command) = receiver.recv().await {
                match command {
                    Command::Record(record) => {
                        if let Err(e) = inner.record(&record).await {
                            warn!(
                                trace_id = %record.trace_id,
                                stage = %record.stage,
                                error = %e,
                                "Failed to deliver audit record"
                            );
                        }
                    }
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Audit delivery task stopped");
        });

        Self { sender }
    }

    /// Wait until every record queued before this call has been delivered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Audit`] if the delivery task has stopped.
    pub async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.sender
            .send(Command::Flush(done_tx))
            .await
            .map_err(|_| Error::Audit("audit delivery task stopped".to_string()))?;
        done_rx
            .await
            .map_err(|_| Error::Audit("audit delivery task stopped".to_string()))
    }
}

#[async_trait]
impl AuditSink for BackgroundAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        self.sender
            .try_send(Command::Record(Box::new(record.clone())))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    Error::Audit("audit queue full, record dropped".to_string())
                }
                mpsc::error::TrySendError::Closed(_) => {
                    Error::Audit("audit delivery task stopped".to_string())
                }
            })
    }
}
