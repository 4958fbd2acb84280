use tokio::sync::mpsc;

use super::BackgroundJob;
use crate::metrics;

/// Handle for queueing background jobs
///
/// Cheaply cloneable. Submission never blocks and never fails the caller.
#[derive(Clone)]
pub struct BackgroundHandle {
    tx: mpsc::Sender<BackgroundJob>,
}

impl BackgroundHandle {
    pub fn new(tx: mpsc::Sender<BackgroundJob>) -> Self {
        Self { tx }
    }

    /// Try to queue a job without blocking
    ///
    /// Returns true if the job was queued. A full or closed channel is logged.
    pub fn try_submit(&self, job: BackgroundJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(e) => {
                metrics::BACKGROUND_JOBS_DROPPED.inc();
                tracing::warn!("Dropped background job: {}", e);
                false
            }
        }
    }

    /// Handle whose jobs go nowhere, for contexts without a worker.
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }
}
