use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, warn};

use super::request::{
    abbreviate_commit, canonical_path, is_full_commit_hash, parse_tarball_path, ReadMethod,
    TarballPath, UrlShape,
};
use crate::artifact::{
    normalize_package_name, ArtifactMeta, ArtifactStore, CommitPrefix, ListCursor, PackageKey,
};
use crate::background::{BackgroundHandle, BackgroundJob};
use crate::cursor::CursorStore;
use crate::error::{ServiceError, ServiceResult};
use crate::metrics;
use crate::registry::{parse_repository_url, PackageRegistry, RegistryError};

const LISTING_PAGE_SIZE: u32 = 100;

/// A tarball found for a request.
#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    pub meta: ArtifactMeta,
    /// `owner:repo:refOrSha` as requested.
    pub commit_key: String,
    /// Normalized package name.
    pub package_key: String,
    /// `None` for HEAD requests.
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub enum Resolution {
    /// Not a tarball request; the caller should route it normally.
    Passthrough,
    Redirect { location: String },
    Artifact(ResolvedArtifact),
}

impl Resolution {
    fn outcome(&self) -> &'static str {
        match self {
            Resolution::Passthrough => "passthrough",
            Resolution::Redirect { .. } => "redirect",
            Resolution::Artifact(_) => "served",
        }
    }
}

/// Maps tarball URLs onto stored artifacts.
pub struct ResolverService {
    cursors: Arc<dyn CursorStore>,
    artifacts: Arc<dyn ArtifactStore>,
    registry: Arc<dyn PackageRegistry>,
    background: BackgroundHandle,
    registry_timeout: Duration,
}

impl ResolverService {
    pub fn new(
        cursors: Arc<dyn CursorStore>,
        artifacts: Arc<dyn ArtifactStore>,
        registry: Arc<dyn PackageRegistry>,
        background: BackgroundHandle,
        registry_timeout: Duration,
    ) -> Self {
        Self {
            cursors,
            artifacts,
            registry,
            background,
            registry_timeout,
        }
    }

    pub async fn resolve(&self, method: &str, path: &str) -> ServiceResult<Resolution> {
        let result = self.resolve_inner(method, path).await;
        let outcome = match &result {
            Ok(resolution) => resolution.outcome(),
            Err(ServiceError::NotFound(_)) => "not_found",
            Err(_) => "error",
        };
        metrics::TARBALL_RESOLUTIONS
            .with_label_values(&[outcome])
            .inc();
        result
    }

    async fn resolve_inner(&self, method: &str, path: &str) -> ServiceResult<Resolution> {
        let Some(method) = ReadMethod::from_name(method) else {
            return Ok(Resolution::Passthrough);
        };
        let Some(request) = parse_tarball_path(path)? else {
            return Ok(Resolution::Passthrough);
        };

        let (owner, repo) = match (&request.owner, &request.repo) {
            (Some(owner), Some(repo)) => (owner.clone(), repo.clone()),
            _ => self.recover_repository(&request.package).await?,
        };

        let (ref_or_sha, cursor_hit) = self.resolve_ref(&owner, &repo, &request)?;

        if request.shape != UrlShape::Full || cursor_hit {
            let location = canonical_path(&owner, &repo, &request.package, &ref_or_sha);
            debug!("Redirecting {} to {}", path, location);
            return Ok(Resolution::Redirect { location });
        }

        let artifact = self.find_artifact(&owner, &repo, &request.package, &ref_or_sha, method)?;
        Ok(Resolution::Artifact(artifact))
    }

    /// Replace a ref with its cursor's abbreviated commit. Full hashes are never looked up.
    fn resolve_ref(
        &self,
        owner: &str,
        repo: &str,
        request: &TarballPath,
    ) -> ServiceResult<(String, bool)> {
        if is_full_commit_hash(&request.ref_or_sha) {
            return Ok((request.ref_or_sha.clone(), false));
        }

        match self.cursors.get(owner, repo, &request.ref_or_sha)? {
            Some(cursor) => {
                metrics::CURSOR_LOOKUPS.with_label_values(&["hit"]).inc();
                Ok((abbreviate_commit(&cursor.commit).to_string(), true))
            }
            None => {
                metrics::CURSOR_LOOKUPS.with_label_values(&["miss"]).inc();
                Ok((request.ref_or_sha.clone(), false))
            }
        }
    }

    /// Owner and repository declared by the package's registry manifest.
    async fn recover_repository(&self, package: &str) -> ServiceResult<(String, String)> {
        let not_found = || ServiceError::NotFound("registry or repository not found".to_string());

        let started = Instant::now();
        let lookup = tokio::time::timeout(self.registry_timeout, self.registry.get_manifest(package)).await;
        metrics::EXTERNAL_SERVICE_DURATION
            .with_label_values(&["registry", "get_manifest"])
            .observe(started.elapsed().as_secs_f64());

        let manifest = match lookup {
            Err(_) => {
                return Err(ServiceError::UpstreamTimeout(format!(
                    "Registry lookup for {package} timed out"
                )))
            }
            Ok(Err(RegistryError::HttpError(e))) if e.is_timeout() => {
                return Err(ServiceError::UpstreamTimeout(format!(
                    "Registry lookup for {package} timed out"
                )))
            }
            Ok(Err(RegistryError::NotFound(_))) => return Err(not_found()),
            Ok(Err(e)) => {
                warn!("Registry lookup for {} failed: {}", package, e);
                return Err(not_found());
            }
            Ok(Ok(manifest)) => manifest,
        };

        manifest
            .repository_url
            .as_deref()
            .and_then(parse_repository_url)
            .ok_or_else(not_found)
    }

    fn find_artifact(
        &self,
        owner: &str,
        repo: &str,
        package: &str,
        ref_or_sha: &str,
        method: ReadMethod,
    ) -> ServiceResult<ResolvedArtifact> {
        let not_found = || ServiceError::NotFound("package not found".to_string());

        let prefix = CommitPrefix::new(owner, repo, ref_or_sha).map_err(|_| not_found())?;
        let normalized = normalize_package_name(package);
        let meta = self
            .first_match(&prefix, &normalized)?
            .ok_or_else(not_found)?;

        let body = match method {
            ReadMethod::Head => None,
            ReadMethod::Get => {
                let stored = self.artifacts.get(&meta.key)?.ok_or_else(not_found)?;
                self.background.try_submit(BackgroundJob::RecordDownload {
                    key: meta.key.clone(),
                    at: Utc::now(),
                });
                Some(stored.bytes)
            }
        };

        Ok(ResolvedArtifact {
            meta,
            commit_key: prefix.header_value(),
            package_key: normalized,
            body,
        })
    }

    /// First object under the commit prefix whose package component equals `normalized`.
    fn first_match(
        &self,
        prefix: &CommitPrefix,
        normalized: &str,
    ) -> ServiceResult<Option<ArtifactMeta>> {
        let listing_prefix = prefix.listing_prefix();
        let mut cursor: Option<ListCursor> = None;

        loop {
            let page = self
                .artifacts
                .list(&listing_prefix, cursor.as_ref(), LISTING_PAGE_SIZE)?;

            let found = page.objects.into_iter().find(|meta| {
                PackageKey::decode(&meta.key)
                    .map(|key| prefix.selects(&key, normalized))
                    .unwrap_or(false)
            });
            if found.is_some() {
                return Ok(found);
            }

            match page.cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(None),
            }
        }
    }
}
