//! Workflow registry trait and error type.

use thiserror::Error;

use super::WorkflowTicket;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Never registered, or already consumed. The two are indistinguishable.
    #[error("Workflow ticket not found: {0}")]
    NotFound(String),

    #[error("Ordering number {0} is out of range")]
    OrderingOutOfRange(u64),

    #[error("Database error: {0}")]
    Database(String),
}

/// One-shot ticket storage.
pub trait WorkflowRegistry: Send + Sync {
    /// Store a ticket, replacing any ticket under the same key.
    fn register(&self, ticket: &WorkflowTicket) -> Result<(), WorkflowError>;

    /// Read a ticket without consuming it.
    fn get(&self, key: &str) -> Result<Option<WorkflowTicket>, WorkflowError>;

    /// Atomically return and remove a ticket.
    ///
    /// After one successful take, every later take of the same key fails with `NotFound`.
    fn take(&self, key: &str) -> Result<WorkflowTicket, WorkflowError>;
}
