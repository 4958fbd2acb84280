//! Ref cursors: the latest published commit for each branch or pull request.

mod sqlite;

pub use sqlite::SqliteCursorStore;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Largest ordering number the stores accept.
pub const MAX_ORDERING_NUMBER: u64 = i64::MAX as u64;

#[derive(Debug, Error)]
pub enum CursorError {
    /// SQLite integers are signed, so ordering numbers stop at `i64::MAX`.
    #[error("Ordering number {0} is out of range")]
    OrderingOutOfRange(u64),

    #[error("Database error: {0}")]
    Database(String),
}

/// Latest commit published for a ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub commit: String,
    pub ordering_number: u64,
    pub updated_at: DateTime<Utc>,
}

/// Trait for cursor storage backends.
pub trait CursorStore: Send + Sync {
    fn get(&self, owner: &str, repo: &str, git_ref: &str) -> Result<Option<Cursor>, CursorError>;

    /// Point the ref at `commit` unless a run with an equal or higher ordering number
    /// already claimed it. Losing the race is not an error.
    ///
    /// Returns whether the cursor moved.
    fn advance(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
        commit: &str,
        ordering_number: u64,
    ) -> Result<bool, CursorError>;
}
