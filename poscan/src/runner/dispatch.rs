use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::db::DatabaseBackend;

/// How a worker obtains its next job id. Implemented by the in-process
/// queue and the database-polling claim; selected once at startup.
#[async_trait]
pub trait WorkSource: Send + Sync {
    /// Wait for the next job id. `None` means the source is shut down and
    /// the worker loop should exit.
    async fn acquire(&self, cancel: &CancellationToken) -> Option<String>;
}

/// Shared FIFO channel of job ids fed by the upload endpoint. Each id is
/// delivered to exactly one worker.
pub struct QueueSource {
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl QueueSource {
    pub fn new(rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self { rx: Mutex::new(rx) }
    }
}

#[async_trait]
impl WorkSource for QueueSource {
    async fn acquire(&self, cancel: &CancellationToken) -> Option<String> {
        tokio::select! {
            _ = cancel.cancelled() => None,
            job_id = async { self.rx.lock().await.recv().await } => job_id,
        }
    }
}

/// Claims the oldest queued job from the shared store and sleeps between
/// empty cycles. A lost claim race reads as an empty cycle, not an error.
/// Tolerates multiple independent worker processes against one store.
pub struct PollingSource {
    db: Arc<dyn DatabaseBackend>,
    poll_interval: Duration,
}

impl PollingSource {
    pub fn new(db: Arc<dyn DatabaseBackend>, poll_interval_ms: u64) -> Self {
        Self {
            db,
            poll_interval: Duration::from_millis(poll_interval_ms.max(100)),
        }
    }
}

#[async_trait]
impl WorkSource for PollingSource {
    async fn acquire(&self, cancel: &CancellationToken) -> Option<String> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }

            match self.db.claim_next_queued().await {
                Ok(Some(job_id)) => return Some(job_id),
                Ok(None) => {}
                Err(e) => error!("Polling claim failed: {e}"),
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
