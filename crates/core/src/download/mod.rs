//! Last-download timestamps, consulted by the retention sweep.
//!
//! Entries are keyed by the artifact key they track. A missing entry means
//! the artifact was never downloaded.

mod sqlite;

pub use sqlite::SqliteDownloadIndex;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Namespace under which download records are persisted.
pub const DOWNLOAD_NAMESPACE: &str = "downloaded-at";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Trait for download index backends.
pub trait DownloadIndex: Send + Sync {
    /// Record a successful read. Never moves an entry backwards in time.
    fn record(&self, artifact_key: &str, at: DateTime<Utc>) -> Result<(), DownloadError>;

    fn last_download(&self, artifact_key: &str) -> Result<Option<DateTime<Utc>>, DownloadError>;

    fn remove(&self, artifact_key: &str) -> Result<(), DownloadError>;
}
