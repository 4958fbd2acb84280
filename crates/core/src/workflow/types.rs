//! Workflow ticket types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One-shot record correlating a CI run to the commit it built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTicket {
    /// Idempotency key, see [`WorkflowTicket::key_for`].
    pub key: String,
    pub owner: String,
    pub repo: String,
    pub commit: String,
    /// Branch name, or the pull request number for pull request runs.
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Monotonic run number used to order cursor updates.
    pub ordering_number: u64,
    pub created_at: DateTime<Utc>,
}

impl WorkflowTicket {
    /// Derive the ticket key from the identity of a CI run.
    ///
    /// The publishing client computes the same value from its environment.
    pub fn key_for(run_url: &str, attempt: u32, actor: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(run_url.as_bytes());
        hasher.update(b":");
        hasher.update(attempt.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(actor.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Pull request number when the ref names one.
    pub fn pull_request_number(&self) -> Option<u64> {
        pull_request_number(&self.git_ref)
    }
}

/// Refs made only of digits name pull requests.
pub fn pull_request_number(git_ref: &str) -> Option<u64> {
    if git_ref.is_empty() || !git_ref.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    git_ref.parse().ok()
}

/// Run identity reported by the CI-event collaborator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterWorkflowRequest {
    pub run_url: String,
    pub attempt: u32,
    pub actor: String,
    pub owner: String,
    pub repo: String,
    pub commit: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub ordering_number: u64,
}

impl RegisterWorkflowRequest {
    pub fn into_ticket(self) -> WorkflowTicket {
        WorkflowTicket {
            key: WorkflowTicket::key_for(&self.run_url, self.attempt, &self.actor),
            owner: self.owner,
            repo: self.repo,
            commit: self.commit,
            git_ref: self.git_ref,
            ordering_number: self.ordering_number,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        let a = WorkflowTicket::key_for("https://github.com/acme/widgets/actions/runs/1", 1, "octocat");
        let b = WorkflowTicket::key_for("https://github.com/acme/widgets/actions/runs/1", 1, "octocat");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_key_changes_with_attempt_and_actor() {
        let url = "https://github.com/acme/widgets/actions/runs/1";
        let base = WorkflowTicket::key_for(url, 1, "octocat");
        assert_ne!(base, WorkflowTicket::key_for(url, 2, "octocat"));
        assert_ne!(base, WorkflowTicket::key_for(url, 1, "hubot"));
    }

    #[test]
    fn test_pull_request_number() {
        assert_eq!(pull_request_number("123"), Some(123));
        assert_eq!(pull_request_number("main"), None);
        assert_eq!(pull_request_number("12a"), None);
        assert_eq!(pull_request_number(""), None);
    }

    #[test]
    fn test_register_request_deserialize() {
        let json = serde_json::json!({
            "runUrl": "https://github.com/acme/widgets/actions/runs/7",
            "attempt": 1,
            "actor": "octocat",
            "owner": "acme",
            "repo": "widgets",
            "commit": "deadbee0",
            "ref": "main",
            "orderingNumber": 7
        });
        let request: RegisterWorkflowRequest = serde_json::from_value(json).unwrap();
        let ticket = request.into_ticket();
        assert_eq!(ticket.git_ref, "main");
        assert_eq!(ticket.ordering_number, 7);
        assert_eq!(
            ticket.key,
            WorkflowTicket::key_for("https://github.com/acme/widgets/actions/runs/7", 1, "octocat")
        );
    }
}
