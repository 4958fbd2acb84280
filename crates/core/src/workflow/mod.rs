//! Workflow tickets correlating CI runs to commits.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteWorkflowRegistry;
pub use store::{WorkflowError, WorkflowRegistry};
pub use types::{pull_request_number, RegisterWorkflowRequest, WorkflowTicket};
