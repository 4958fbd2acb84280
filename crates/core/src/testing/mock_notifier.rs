//! Mock notifier for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::notifier::{CheckRun, Comment, Notifier, NotifierError, PublishSummary};

/// A recorded notifier call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedNotifierCall {
    InstallationExists { owner: String, repo: String },
    FindCheck { commit: String },
    CreateCheck { commit: String },
    PullRequestOpen { number: u64 },
    FindBotComment { number: u64 },
    CreateComment { number: u64 },
    UpdateComment { comment_id: u64 },
}

/// Mock implementation of the Notifier trait.
///
/// Every repository counts as installed unless removed with `set_installed`.
#[derive(Debug)]
pub struct MockNotifier {
    uninstalled: Arc<RwLock<HashSet<(String, String)>>>,
    checks: Arc<RwLock<HashMap<String, CheckRun>>>,
    open_pull_requests: Arc<RwLock<HashSet<u64>>>,
    /// Bot comments by pull request number.
    comments: Arc<RwLock<HashMap<u64, Vec<Comment>>>>,
    /// Last summary rendered into each comment.
    comment_bodies: Arc<RwLock<HashMap<u64, PublishSummary>>>,
    calls: Arc<RwLock<Vec<RecordedNotifierCall>>>,
    next_id: Arc<RwLock<u64>>,
    failing: Arc<RwLock<bool>>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            uninstalled: Arc::new(RwLock::new(HashSet::new())),
            checks: Arc::new(RwLock::new(HashMap::new())),
            open_pull_requests: Arc::new(RwLock::new(HashSet::new())),
            comments: Arc::new(RwLock::new(HashMap::new())),
            comment_bodies: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(RwLock::new(1)),
            failing: Arc::new(RwLock::new(false)),
            delay: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn set_installed(&self, owner: &str, repo: &str, installed: bool) {
        let key = (owner.to_string(), repo.to_string());
        let mut uninstalled = self.uninstalled.write().await;
        if installed {
            uninstalled.remove(&key);
        } else {
            uninstalled.insert(key);
        }
    }

    pub async fn open_pull_request(&self, number: u64) {
        self.open_pull_requests.write().await.insert(number);
    }

    /// Make every call fail with an API error.
    pub async fn set_failing(&self, failing: bool) {
        *self.failing.write().await = failing;
    }

    /// Delay every call, e.g. to exceed a caller's timeout.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().await = delay;
    }

    pub async fn calls(&self) -> Vec<RecordedNotifierCall> {
        self.calls.read().await.clone()
    }

    pub async fn checks(&self) -> Vec<CheckRun> {
        self.checks.read().await.values().cloned().collect()
    }

    pub async fn comments_on(&self, number: u64) -> Vec<Comment> {
        self.comments
            .read()
            .await
            .get(&number)
            .cloned()
            .unwrap_or_default()
    }

    /// Summary last written into the comment with `id`.
    pub async fn comment_summary(&self, id: u64) -> Option<PublishSummary> {
        self.comment_bodies.read().await.get(&id).cloned()
    }

    async fn enter(&self, call: RecordedNotifierCall) -> Result<(), NotifierError> {
        self.calls.write().await.push(call);

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.failing.read().await {
            return Err(NotifierError::ApiError {
                status: 500,
                message: "mock failure".to_string(),
            });
        }
        Ok(())
    }

    async fn allocate_id(&self) -> u64 {
        let mut next = self.next_id.write().await;
        let id = *next;
        *next += 1;
        id
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn installation_exists(&self, owner: &str, repo: &str) -> Result<bool, NotifierError> {
        self.enter(RecordedNotifierCall::InstallationExists {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
        .await?;
        let key = (owner.to_string(), repo.to_string());
        Ok(!self.uninstalled.read().await.contains(&key))
    }

    async fn find_check(
        &self,
        _owner: &str,
        _repo: &str,
        commit: &str,
    ) -> Result<Option<CheckRun>, NotifierError> {
        self.enter(RecordedNotifierCall::FindCheck {
            commit: commit.to_string(),
        })
        .await?;
        Ok(self.checks.read().await.get(commit).cloned())
    }

    async fn create_check(&self, summary: &PublishSummary) -> Result<CheckRun, NotifierError> {
        self.enter(RecordedNotifierCall::CreateCheck {
            commit: summary.commit.clone(),
        })
        .await?;
        let check = CheckRun {
            id: self.allocate_id().await,
            commit: summary.commit.clone(),
        };
        self.checks
            .write()
            .await
            .insert(summary.commit.clone(), check.clone());
        Ok(check)
    }

    async fn pull_request_open(
        &self,
        _owner: &str,
        _repo: &str,
        number: u64,
    ) -> Result<bool, NotifierError> {
        self.enter(RecordedNotifierCall::PullRequestOpen { number })
            .await?;
        Ok(self.open_pull_requests.read().await.contains(&number))
    }

    async fn find_bot_comment(
        &self,
        _owner: &str,
        _repo: &str,
        number: u64,
    ) -> Result<Option<Comment>, NotifierError> {
        self.enter(RecordedNotifierCall::FindBotComment { number })
            .await?;
        Ok(self
            .comments
            .read()
            .await
            .get(&number)
            .and_then(|comments| comments.first().cloned()))
    }

    async fn create_comment(
        &self,
        number: u64,
        summary: &PublishSummary,
    ) -> Result<Comment, NotifierError> {
        self.enter(RecordedNotifierCall::CreateComment { number })
            .await?;
        let comment = Comment {
            id: self.allocate_id().await,
            author: "prpkg[bot]".to_string(),
        };
        self.comments
            .write()
            .await
            .entry(number)
            .or_default()
            .push(comment.clone());
        self.comment_bodies
            .write()
            .await
            .insert(comment.id, summary.clone());
        Ok(comment)
    }

    async fn update_comment(
        &self,
        comment_id: u64,
        summary: &PublishSummary,
    ) -> Result<Comment, NotifierError> {
        self.enter(RecordedNotifierCall::UpdateComment { comment_id })
            .await?;
        let existing = self
            .comments
            .read()
            .await
            .values()
            .flatten()
            .find(|c| c.id == comment_id)
            .cloned()
            .ok_or_else(|| NotifierError::NotFound(format!("comment {comment_id}")))?;
        self.comment_bodies
            .write()
            .await
            .insert(comment_id, summary.clone());
        Ok(existing)
    }
}
