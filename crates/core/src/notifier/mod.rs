//! Source-hosting notifications: check runs and pull request comments.

mod github;
mod types;

pub use github::GithubNotifier;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Notifier not configured")]
    NotConfigured,
}

/// Notifier collaborator.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Whether the service is installed on the repository.
    async fn installation_exists(&self, owner: &str, repo: &str) -> Result<bool, NotifierError>;

    /// The check run this service already created for `commit`, if any.
    async fn find_check(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
    ) -> Result<Option<CheckRun>, NotifierError>;

    async fn create_check(&self, summary: &PublishSummary) -> Result<CheckRun, NotifierError>;

    async fn pull_request_open(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<bool, NotifierError>;

    /// The first comment on the pull request authored by this service.
    async fn find_bot_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Option<Comment>, NotifierError>;

    async fn create_comment(
        &self,
        number: u64,
        summary: &PublishSummary,
    ) -> Result<Comment, NotifierError>;

    async fn update_comment(
        &self,
        comment_id: u64,
        summary: &PublishSummary,
    ) -> Result<Comment, NotifierError>;
}
