//! Fire-and-forget work queued from the serving path.
//!
//! Download records and incremental retention passes only affect garbage
//! collection heuristics, so losing one under load or on crash is acceptable.

mod handle;
mod worker;

pub use handle::BackgroundHandle;
pub use worker::{create_background_system, BackgroundWorker};

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundJob {
    /// An artifact was served successfully.
    RecordDownload { key: String, at: DateTime<Utc> },
    /// Run an incremental retention pass starting just after `key`.
    SweepAfter { key: String },
}

impl BackgroundJob {
    pub fn kind(&self) -> &'static str {
        match self {
            BackgroundJob::RecordDownload { .. } => "record_download",
            BackgroundJob::SweepAfter { .. } => "sweep_after",
        }
    }
}
