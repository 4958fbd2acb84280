//! Repositories exempt from the publish payload ceiling.
//!
//! The allow-list is a plain-text file of `owner/repo` lines. Blank lines and
//! `#` comments are ignored; matching is case-insensitive.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Collaborator answering whether a repository may exceed the payload ceiling.
#[async_trait]
pub trait Whitelist: Send + Sync {
    async fn is_whitelisted(&self, owner: &str, repo: &str) -> bool;
}

/// Parsed allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: HashSet<String>,
}

impl AllowList {
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(|line| line.split('#').next().unwrap_or("").trim())
            .filter(|line| !line.is_empty())
            .filter(|line| line.split('/').count() == 2)
            .map(str::to_ascii_lowercase)
            .collect();
        Self { entries }
    }

    pub fn contains(&self, owner: &str, repo: &str) -> bool {
        self.entries
            .contains(&format!("{owner}/{repo}").to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Whitelist for AllowList {
    async fn is_whitelisted(&self, owner: &str, repo: &str) -> bool {
        self.contains(owner, repo)
    }
}

/// A value with a wall-clock expiry.
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

impl<T> Cached<T> {
    pub fn new(value: T, now: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        Self {
            value,
            expires_at: now + ttl,
        }
    }

    /// The value, if it has not expired at `now`.
    pub fn fresh(&self, now: DateTime<Utc>) -> Option<&T> {
        (now < self.expires_at).then_some(&self.value)
    }
}

/// File-backed allow-list, re-read once its cache entry goes stale.
pub struct FileWhitelist {
    path: Option<PathBuf>,
    ttl: Duration,
    cache: RwLock<Option<Cached<AllowList>>>,
}

impl FileWhitelist {
    pub fn new(path: Option<PathBuf>, ttl: Duration) -> Self {
        Self {
            path,
            ttl,
            cache: RwLock::new(None),
        }
    }

    async fn load(&self) -> AllowList {
        let Some(path) = &self.path else {
            return AllowList::default();
        };

        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                let list = AllowList::parse(&text);
                debug!("Loaded {} whitelist entries from {:?}", list.len(), path);
                list
            }
            Err(e) => {
                warn!("Failed to read whitelist {:?}: {}", path, e);
                AllowList::default()
            }
        }
    }

    /// Current allow-list as of `now`, reloading if the cached copy expired.
    pub async fn current(&self, now: DateTime<Utc>) -> AllowList {
        if let Some(list) = self.cache.read().await.as_ref().and_then(|c| c.fresh(now)) {
            return list.clone();
        }

        let list = self.load().await;
        *self.cache.write().await = Some(Cached::new(list.clone(), now, self.ttl));
        list
    }
}

#[async_trait]
impl Whitelist for FileWhitelist {
    async fn is_whitelisted(&self, owner: &str, repo: &str) -> bool {
        self.current(Utc::now()).await.contains(owner, repo)
    }
}
