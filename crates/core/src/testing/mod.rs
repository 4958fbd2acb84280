//! Testing utilities and mock collaborators.
//!
//! This module provides mock implementations of the external collaborator
//! traits, so services and HTTP handlers can be tested without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use prpkg_core::testing::{MockNotifier, MockRegistry};
//!
//! let registry = MockRegistry::new();
//! registry.add_package("tinybench", "https://github.com/tinylibs/tinybench").await;
//!
//! let notifier = MockNotifier::new();
//! notifier.open_pull_request(12).await;
//!
//! // Use in AppState...
//! ```

mod mock_notifier;
mod mock_registry;

pub use mock_notifier::{MockNotifier, RecordedNotifierCall};
pub use mock_registry::MockRegistry;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::workflow::WorkflowTicket;

    /// A full 40-character commit hash built by repeating `seed`.
    pub fn commit(seed: &str) -> String {
        seed.repeat(40).chars().take(40).collect()
    }

    /// Create a workflow ticket with reasonable defaults.
    pub fn ticket(key: &str, owner: &str, repo: &str, commit: &str, git_ref: &str) -> WorkflowTicket {
        WorkflowTicket {
            key: key.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            commit: commit.to_string(),
            git_ref: git_ref.to_string(),
            ordering_number: 1,
            created_at: Utc::now(),
        }
    }

    /// Bytes standing in for a gzipped tarball.
    pub fn tarball(contents: &str) -> Vec<u8> {
        let mut bytes = vec![0x1f, 0x8b, 0x08, 0x00];
        bytes.extend_from_slice(contents.as_bytes());
        bytes
    }
}
