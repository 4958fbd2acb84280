use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::template::{is_binary, render_launch_document, rewrite_package_json, AssetBody};
use super::{
    CheckResponse, PackageSource, PackageUpload, PublishRequest, PublishResponse, TemplateAsset,
};
use crate::artifact::{
    sha256_hex, ArtifactError, ArtifactMeta, ArtifactStore, PackageKey, PartReceipt, PutOptions,
    TemplateKey, UploadKey, UploadSession, TARBALL_CONTENT_TYPE,
};
use crate::background::{BackgroundHandle, BackgroundJob};
use crate::config::PublishConfig;
use crate::cursor::{CursorStore, MAX_ORDERING_NUMBER};
use crate::error::{ServiceError, ServiceResult};
use crate::metrics;
use crate::notifier::{
    CommentPolicy, Notifier, NotifierError, PublishSummary, PublishedPackage, PublishedTemplate,
};
use crate::resolver::public_path;
use crate::whitelist::Whitelist;
use crate::workflow::{WorkflowRegistry, WorkflowTicket};

/// Publish knobs taken from `[publish]`.
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub max_payload_bytes: u64,
    pub public_url: String,
    pub template_launch_url: String,
    pub notify_timeout: Duration,
}

impl From<&PublishConfig> for PublishSettings {
    fn from(config: &PublishConfig) -> Self {
        Self {
            max_payload_bytes: config.max_payload_bytes,
            public_url: config.public_url.trim_end_matches('/').to_string(),
            template_launch_url: config.template_launch_url.clone(),
            notify_timeout: Duration::from_secs(config.notify_timeout_secs),
        }
    }
}

/// A package whose bytes passed verification, ready to store.
struct VerifiedPackage {
    name: String,
    bytes: Vec<u8>,
    hash: String,
    staged_key: Option<String>,
}

/// Consumes workflow tickets and turns publish payloads into stored artifacts.
pub struct PublishService {
    workflows: Arc<dyn WorkflowRegistry>,
    cursors: Arc<dyn CursorStore>,
    artifacts: Arc<dyn ArtifactStore>,
    whitelist: Arc<dyn Whitelist>,
    notifier: Option<Arc<dyn Notifier>>,
    background: BackgroundHandle,
    settings: PublishSettings,
}

impl PublishService {
    pub fn new(
        workflows: Arc<dyn WorkflowRegistry>,
        cursors: Arc<dyn CursorStore>,
        artifacts: Arc<dyn ArtifactStore>,
        whitelist: Arc<dyn Whitelist>,
        notifier: Option<Arc<dyn Notifier>>,
        background: BackgroundHandle,
        settings: PublishSettings,
    ) -> Self {
        Self {
            workflows,
            cursors,
            artifacts,
            whitelist,
            notifier,
            background,
            settings,
        }
    }

    /// Consume the ticket for `key`, then enforce the payload ceiling.
    ///
    /// The ticket is gone once this returns, whether or not the size check passes.
    pub async fn authorize(
        &self,
        key: &str,
        payload_size: Option<u64>,
    ) -> ServiceResult<WorkflowTicket> {
        let ticket = self.workflows.take(key).map_err(|e| {
            metrics::PUBLISH_REJECTIONS
                .with_label_values(&["unauthorized"])
                .inc();
            ServiceError::from(e)
        })?;

        if let Some(size) = payload_size {
            self.enforce_ceiling(&ticket, size).await?;
        }
        Ok(ticket)
    }

    async fn enforce_ceiling(&self, ticket: &WorkflowTicket, size: u64) -> ServiceResult<()> {
        self.enforce_ceiling_for(&ticket.owner, &ticket.repo, size)
            .await
    }

    async fn enforce_ceiling_for(&self, owner: &str, repo: &str, size: u64) -> ServiceResult<()> {
        if size <= self.settings.max_payload_bytes {
            return Ok(());
        }
        if self.whitelist.is_whitelisted(owner, repo).await {
            debug!("{}/{} is whitelisted, accepting {} bytes", owner, repo, size);
            return Ok(());
        }

        metrics::PUBLISH_REJECTIONS
            .with_label_values(&["too_large"])
            .inc();
        Err(ServiceError::PayloadTooLarge {
            size,
            limit: self.settings.max_payload_bytes,
        })
    }

    /// Store the payload for an authorized ticket.
    ///
    /// The ceiling covers inline bytes and every staged upload the payload references.
    pub async fn publish(
        &self,
        ticket: &WorkflowTicket,
        request: PublishRequest,
    ) -> ServiceResult<PublishResponse> {
        if request.packages.is_empty() {
            metrics::PUBLISH_REJECTIONS
                .with_label_values(&["malformed"])
                .inc();
            return Err(ServiceError::MalformedRequest(
                "No packages in publish payload".to_string(),
            ));
        }
        if let Some(number) = request.ordering_number.filter(|n| *n > MAX_ORDERING_NUMBER) {
            metrics::PUBLISH_REJECTIONS
                .with_label_values(&["malformed"])
                .inc();
            return Err(ServiceError::MalformedRequest(format!(
                "Run id {number} is out of range"
            )));
        }

        let staged_bytes = self.staged_size(ticket, &request.packages)?;
        self.enforce_ceiling(ticket, request.inline_size() + staged_bytes)
            .await?;

        let verified = self
            .verify_packages(&request.packages, &request.content_hashes)
            .inspect_err(|_| {
                metrics::PUBLISH_REJECTIONS
                    .with_label_values(&["malformed"])
                    .inc();
            })?;

        let mut urls = Vec::with_capacity(verified.len());
        let mut published = Vec::with_capacity(verified.len());
        let mut last_key = None;
        for package in verified {
            let key = PackageKey::new(&ticket.owner, &ticket.repo, &ticket.commit, &package.name)?;
            let encoded = key.encode();
            self.artifacts.put(
                &encoded,
                &package.bytes,
                PutOptions::new()
                    .with_content_hash(package.hash)
                    .with_content_type(TARBALL_CONTENT_TYPE),
            )?;
            if let Some(staged) = &package.staged_key {
                self.artifacts.delete(staged)?;
            }
            metrics::PACKAGES_PUBLISHED.inc();

            let url = self.public_url(&public_path(
                &ticket.owner,
                &ticket.repo,
                &package.name,
                &ticket.commit,
            ));
            published.push(PublishedPackage {
                name: package.name,
                url: url.clone(),
            });
            urls.push(url);
            last_key = Some(encoded);
        }

        if let Some(key) = last_key {
            self.background.try_submit(BackgroundJob::SweepAfter { key });
        }

        let templates = self.store_templates(&request.templates, &published)?;

        let ordering_number = request.ordering_number.unwrap_or(ticket.ordering_number);
        let moved = self.cursors.advance(
            &ticket.owner,
            &ticket.repo,
            &ticket.git_ref,
            &ticket.commit,
            ordering_number,
        )?;
        if !moved {
            debug!(
                "Cursor {}/{}@{} already claimed by a newer run",
                ticket.owner, ticket.repo, ticket.git_ref
            );
        }

        info!(
            "Published {} package(s) and {} template(s) for {}/{}@{}",
            published.len(),
            templates.len(),
            ticket.owner,
            ticket.repo,
            ticket.commit
        );

        let summary = PublishSummary {
            owner: ticket.owner.clone(),
            repo: ticket.repo.clone(),
            commit: ticket.commit.clone(),
            git_ref: ticket.git_ref.clone(),
            packages: published,
            templates: templates
                .iter()
                .map(|(name, url)| PublishedTemplate {
                    name: name.clone(),
                    url: url.clone(),
                })
                .collect(),
            flags: request.flags,
        };
        self.notify(ticket, &summary).await;

        Ok(PublishResponse {
            ok: true,
            urls,
            templates: templates.into_iter().collect(),
        })
    }

    /// Look up the ticket without consuming it and confirm the notifier is installed.
    pub async fn check(&self, key: &str) -> ServiceResult<CheckResponse> {
        let ticket = self.workflows.get(key)?.ok_or_else(|| {
            ServiceError::Unauthorized("Workflow ticket not found, not authorized".to_string())
        })?;

        if let Some(notifier) = &self.notifier {
            let installed = tokio::time::timeout(
                self.settings.notify_timeout,
                notifier.installation_exists(&ticket.owner, &ticket.repo),
            )
            .await
            .map_err(|_| {
                ServiceError::UpstreamTimeout("Installation lookup timed out".to_string())
            })?
            .map_err(|e| ServiceError::Internal(format!("Installation lookup failed: {e}")))?;

            if !installed {
                return Err(ServiceError::NotFound(format!(
                    "App not installed on {}/{}",
                    ticket.owner, ticket.repo
                )));
            }
        }

        Ok(CheckResponse {
            ok: true,
            sha: ticket.commit,
        })
    }

    /// Open a chunked upload for the repository of a live ticket. The ticket is not consumed.
    pub fn open_upload(&self, ticket_key: &str) -> ServiceResult<(WorkflowTicket, UploadSession)> {
        let ticket = self.workflows.get(ticket_key)?.ok_or_else(|| {
            ServiceError::Unauthorized("Workflow ticket not found, not authorized".to_string())
        })?;
        let key = UploadKey::generate(&ticket.owner, &ticket.repo)?;
        let session = self.artifacts.create_upload(&key.encode())?;
        Ok((ticket, session))
    }

    /// Store one part and hold the session's running total to the payload ceiling.
    pub async fn upload_part(
        &self,
        upload_id: &str,
        part_number: u32,
        bytes: &[u8],
    ) -> ServiceResult<PartReceipt> {
        let receipt = self.artifacts.upload_part(upload_id, part_number, bytes)?;
        self.guard_upload(upload_id).await?;
        Ok(receipt)
    }

    pub async fn complete_upload(&self, upload_id: &str) -> ServiceResult<ArtifactMeta> {
        self.guard_upload(upload_id).await?;
        Ok(self.artifacts.complete_upload(upload_id)?)
    }

    /// A session that outgrows the ceiling is dropped along with its parts.
    async fn guard_upload(&self, upload_id: &str) -> ServiceResult<()> {
        let session = self
            .artifacts
            .upload_session(upload_id)?
            .ok_or_else(|| ArtifactError::UploadNotFound(upload_id.to_string()))?;
        let key = UploadKey::decode(&session.key)?;

        if let Err(e) = self
            .enforce_ceiling_for(&key.owner, &key.repo, session.received_bytes)
            .await
        {
            self.artifacts.abort_upload(upload_id)?;
            info!(
                "Dropped upload {} for {}/{} at {} bytes",
                upload_id, key.owner, key.repo, session.received_bytes
            );
            return Err(e);
        }
        Ok(())
    }

    /// Total size of the staged uploads `packages` reference.
    ///
    /// Each reference must name an upload opened for the ticket's repository.
    fn staged_size(&self, ticket: &WorkflowTicket, packages: &[PackageUpload]) -> ServiceResult<u64> {
        let mut total = 0u64;
        for package in packages {
            let PackageSource::Staged(key) = &package.source else {
                continue;
            };
            let upload = UploadKey::decode(key).map_err(|_| {
                ServiceError::MalformedRequest(format!(
                    "Invalid upload reference for {}",
                    package.name
                ))
            })?;
            if !upload.belongs_to(&ticket.owner, &ticket.repo) {
                metrics::PUBLISH_REJECTIONS
                    .with_label_values(&["unauthorized"])
                    .inc();
                return Err(ServiceError::Unauthorized(format!(
                    "Upload for {} was not opened for {}/{}",
                    package.name, ticket.owner, ticket.repo
                )));
            }
            let meta = self
                .artifacts
                .head(key)?
                .ok_or_else(|| ServiceError::NotFound(format!("Upload {key} not found")))?;
            total += meta.size;
        }
        Ok(total)
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}{}", self.settings.public_url, path)
    }

    fn verify_packages(
        &self,
        packages: &[PackageUpload],
        hashes: &HashMap<String, String>,
    ) -> ServiceResult<Vec<VerifiedPackage>> {
        packages
            .iter()
            .map(|package| {
                let (bytes, staged_key) = match &package.source {
                    PackageSource::Inline(bytes) => (bytes.clone(), None),
                    // References were checked by `staged_size`
                    PackageSource::Staged(key) => {
                        let stored = self.artifacts.get(key)?.ok_or_else(|| {
                            ServiceError::NotFound(format!("Upload {key} not found"))
                        })?;
                        (stored.bytes, Some(key.clone()))
                    }
                };

                let declared = hashes.get(&package.name).ok_or_else(|| {
                    ServiceError::MalformedRequest(format!(
                        "Missing content hash for {}",
                        package.name
                    ))
                })?;
                let actual = sha256_hex(&bytes);
                if !declared.eq_ignore_ascii_case(&actual) {
                    return Err(ServiceError::MalformedRequest(format!(
                        "Content hash mismatch for {}",
                        package.name
                    )));
                }

                Ok(VerifiedPackage {
                    name: package.name.clone(),
                    bytes,
                    hash: actual,
                    staged_key,
                })
            })
            .collect()
    }

    /// Store each template's binary assets and launch document. Returns name to URL.
    fn store_templates(
        &self,
        assets: &[TemplateAsset],
        published: &[PublishedPackage],
    ) -> ServiceResult<BTreeMap<String, String>> {
        let mut grouped: BTreeMap<&str, Vec<&TemplateAsset>> = BTreeMap::new();
        for asset in assets {
            grouped.entry(asset.template.as_str()).or_default().push(asset);
        }

        let package_urls: HashMap<String, String> = published
            .iter()
            .map(|p| (p.name.clone(), p.url.clone()))
            .collect();

        let mut urls = BTreeMap::new();
        for (template, files) in grouped {
            let mut bodies = Vec::with_capacity(files.len());
            for file in files {
                let body = if is_binary(&file.bytes) {
                    AssetBody::Url(self.store_binary_asset(file)?)
                } else {
                    let text = String::from_utf8_lossy(&file.bytes);
                    if file.path.rsplit('/').next() == Some("package.json") {
                        AssetBody::Inline(rewrite_package_json(&text, &package_urls))
                    } else {
                        AssetBody::Inline(text.into_owned())
                    }
                };
                bodies.push((file.path.clone(), body));
            }

            let document =
                render_launch_document(template, &self.settings.template_launch_url, &bodies);
            let key = TemplateKey::generate();
            self.artifacts.put(
                &key.encode(),
                document.as_bytes(),
                PutOptions::new().with_content_type("text/html; charset=utf-8"),
            )?;
            metrics::TEMPLATES_PUBLISHED.inc();
            urls.insert(
                template.to_string(),
                self.public_url(&format!("/template/{}", key.id)),
            );
        }
        Ok(urls)
    }

    fn store_binary_asset(&self, asset: &TemplateAsset) -> ServiceResult<String> {
        let key = TemplateKey::generate();
        let content_type = mime_guess::from_path(&asset.path)
            .first_or_octet_stream()
            .to_string();
        self.artifacts.put(
            &key.encode(),
            &asset.bytes,
            PutOptions::new().with_content_type(content_type),
        )?;
        Ok(self.public_url(&format!("/template/{}", key.id)))
    }

    /// Check run and pull request comment. Failures are logged and counted, never returned.
    async fn notify(&self, ticket: &WorkflowTicket, summary: &PublishSummary) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        match self
            .guarded(
                "check",
                notifier.find_check(&ticket.owner, &ticket.repo, &ticket.commit),
            )
            .await
        {
            Some(Some(existing)) => debug!("Reusing check run {}", existing.id),
            Some(None) => {
                self.guarded("check", notifier.create_check(summary)).await;
            }
            None => {}
        }

        let policy = summary.flags.comment;
        if policy == CommentPolicy::Off {
            return;
        }
        let Some(number) = ticket.pull_request_number() else {
            return;
        };

        let open = self
            .guarded(
                "pull_request",
                notifier.pull_request_open(&ticket.owner, &ticket.repo, number),
            )
            .await;
        if open != Some(true) {
            return;
        }

        match policy {
            CommentPolicy::Create => {
                self.guarded("comment", notifier.create_comment(number, summary))
                    .await;
            }
            CommentPolicy::Update => {
                let existing = self
                    .guarded(
                        "comment",
                        notifier.find_bot_comment(&ticket.owner, &ticket.repo, number),
                    )
                    .await;
                match existing {
                    Some(Some(comment)) => {
                        self.guarded("comment", notifier.update_comment(comment.id, summary))
                            .await;
                    }
                    Some(None) => {
                        self.guarded("comment", notifier.create_comment(number, summary))
                            .await;
                    }
                    None => {}
                }
            }
            CommentPolicy::Off => {}
        }
    }

    /// Run one notifier call under the notify timeout.
    async fn guarded<T>(
        &self,
        step: &'static str,
        call: impl Future<Output = Result<T, NotifierError>>,
    ) -> Option<T> {
        let started = Instant::now();
        let result = tokio::time::timeout(self.settings.notify_timeout, call).await;
        metrics::EXTERNAL_SERVICE_DURATION
            .with_label_values(&["notifier", step])
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!("Notifier {} step failed: {}", step, e);
                metrics::NOTIFIER_FAILURES.with_label_values(&[step]).inc();
                None
            }
            Err(_) => {
                warn!("Notifier {} step timed out", step);
                metrics::NOTIFIER_FAILURES.with_label_values(&[step]).inc();
                None
            }
        }
    }
}
