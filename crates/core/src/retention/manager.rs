use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{RetentionError, RetentionPolicy, Verdict};
use crate::artifact::{ArtifactMeta, ArtifactStore, ListCursor};
use crate::config::RetentionConfig;
use crate::download::DownloadIndex;
use crate::metrics;

/// Where a sweep starts and how far it may go.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub start_after: Option<ListCursor>,
    pub page_size: u32,
    /// `None` walks to the end of the store.
    pub max_pages: Option<u32>,
}

impl SweepOptions {
    pub fn full(page_size: u32) -> Self {
        Self {
            start_after: None,
            page_size,
            max_pages: None,
        }
    }
}

/// Result of one sweep.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub removed: Vec<String>,
    pub scanned: u64,
    /// Chunked upload sessions dropped for sitting open past the idle window.
    pub expired_uploads: u64,
    /// Resume point when the sweep stopped before the end of the store.
    #[serde(serialize_with = "serialize_cursor")]
    pub next_cursor: Option<ListCursor>,
}

fn serialize_cursor<S: serde::Serializer>(
    cursor: &Option<ListCursor>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match cursor {
        Some(c) => serializer.serialize_some(c.token()),
        None => serializer.serialize_none(),
    }
}

/// Walks the artifact store page by page and deletes what the policy rejects.
///
/// Holds no lock. Re-running over already-swept keys is harmless.
pub struct RetentionManager {
    artifacts: Arc<dyn ArtifactStore>,
    downloads: Arc<dyn DownloadIndex>,
    policy: RetentionPolicy,
    page_size: u32,
    incremental_pages: u32,
}

impl RetentionManager {
    pub fn new(
        artifacts: Arc<dyn ArtifactStore>,
        downloads: Arc<dyn DownloadIndex>,
        config: &RetentionConfig,
    ) -> Self {
        Self {
            artifacts,
            downloads,
            policy: RetentionPolicy::from(config),
            page_size: config.page_size,
            incremental_pages: config.incremental_pages,
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Sweep the whole store with the configured page size.
    pub fn sweep_all(&self, now: DateTime<Utc>) -> Result<SweepReport, RetentionError> {
        self.sweep(&SweepOptions::full(self.page_size), now)
    }

    /// Bounded sweep starting just after `key`.
    pub fn sweep_after(&self, key: &str, now: DateTime<Utc>) -> Result<SweepReport, RetentionError> {
        let options = SweepOptions {
            start_after: Some(ListCursor::after(key)),
            page_size: self.page_size,
            max_pages: Some(self.incremental_pages),
        };
        self.sweep(&options, now)
    }

    pub fn sweep(
        &self,
        options: &SweepOptions,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, RetentionError> {
        let mut report = SweepReport {
            expired_uploads: self
                .artifacts
                .expire_uploads(self.policy.idle_cutoff(now))?,
            ..SweepReport::default()
        };
        let mut cursor = options.start_after.clone();
        let mut pages = 0u32;

        loop {
            let page = self
                .artifacts
                .list("", cursor.as_ref(), options.page_size.max(1))?;
            pages += 1;

            for meta in &page.objects {
                report.scanned += 1;
                if self.reclaim(meta, now)? {
                    report.removed.push(meta.key.clone());
                }
            }

            cursor = page.cursor;
            let budget_spent = options.max_pages.is_some_and(|max| pages >= max);
            if cursor.is_none() || budget_spent {
                break;
            }
        }

        metrics::RETENTION_SCANNED.inc_by(report.scanned);
        report.next_cursor = cursor;

        info!(
            "Retention sweep: scanned {} objects over {} page(s), removed {}, expired {} upload(s)",
            report.scanned,
            pages,
            report.removed.len(),
            report.expired_uploads
        );
        Ok(report)
    }

    /// Apply the policy to one object. Returns whether it was deleted.
    fn reclaim(&self, meta: &ArtifactMeta, now: DateTime<Utc>) -> Result<bool, RetentionError> {
        let last_download = if self.policy.past_idle_age(meta.uploaded_at, now) {
            self.downloads.last_download(&meta.key)?
        } else {
            None
        };

        let verdict = self.policy.evaluate(meta.uploaded_at, last_download, now);
        if verdict == Verdict::Retain {
            return Ok(false);
        }

        debug!("Deleting {} ({})", meta.key, verdict.as_str());
        let existed = self.artifacts.delete(&meta.key)?;
        if let Err(e) = self.downloads.remove(&meta.key) {
            warn!("Failed to remove download record for {}: {}", meta.key, e);
        }

        if existed {
            metrics::RETENTION_DELETIONS
                .with_label_values(&[verdict.as_str()])
                .inc();
        }
        Ok(existed)
    }
}
