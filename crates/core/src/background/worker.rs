use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use super::{BackgroundHandle, BackgroundJob};
use crate::download::DownloadIndex;
use crate::retention::RetentionManager;

/// Background task applying queued jobs to the download index and retention manager
pub struct BackgroundWorker {
    rx: mpsc::Receiver<BackgroundJob>,
    downloads: Arc<dyn DownloadIndex>,
    retention: Arc<RetentionManager>,
}

impl BackgroundWorker {
    pub fn new(
        rx: mpsc::Receiver<BackgroundJob>,
        downloads: Arc<dyn DownloadIndex>,
        retention: Arc<RetentionManager>,
    ) -> Self {
        Self {
            rx,
            downloads,
            retention,
        }
    }

    /// Run until every handle has been dropped
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        tracing::info!("Background worker started");

        while let Some(job) = self.rx.recv().await {
            self.apply(job).await;
        }

        tracing::info!("Background worker shutting down");
    }

    async fn apply(&self, job: BackgroundJob) {
        match job {
            BackgroundJob::RecordDownload { key, at } => {
                if let Err(e) = self.downloads.record(&key, at) {
                    tracing::error!("Failed to record download of {}: {}", key, e);
                }
            }
            BackgroundJob::SweepAfter { key } => {
                // Pages through SQLite, keep it off the runtime threads
                let retention = Arc::clone(&self.retention);
                let start = key.clone();
                match tokio::task::spawn_blocking(move || retention.sweep_after(&start, Utc::now()))
                    .await
                {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => {
                        tracing::error!("Incremental retention pass after {} failed: {}", key, e)
                    }
                    Err(e) => {
                        tracing::error!("Incremental retention pass after {} panicked: {}", key, e)
                    }
                }
            }
        }
    }
}

/// Create a complete background system
///
/// Returns:
/// - `BackgroundHandle` - for queueing jobs (clone this to share across tasks)
/// - `BackgroundWorker` - spawn this with `tokio::spawn(worker.run())`
pub fn create_background_system(
    downloads: Arc<dyn DownloadIndex>,
    retention: Arc<RetentionManager>,
    buffer_size: usize,
) -> (BackgroundHandle, BackgroundWorker) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = BackgroundHandle::new(tx);
    let worker = BackgroundWorker::new(rx, downloads, retention);
    (handle, worker)
}
