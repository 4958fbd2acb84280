//! npm registry lookups used to recover owner/repo for compact URLs.

mod npm;

pub use npm::NpmRegistryClient;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Package not found in registry: {0}")]
    NotFound(String),

    #[error("Registry error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse registry response: {0}")]
    ParseError(String),
}

/// The slice of a package manifest this service cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageManifest {
    pub name: String,
    pub repository_url: Option<String>,
}

/// Registry collaborator.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    async fn get_manifest(&self, package_name: &str) -> Result<PackageManifest, RegistryError>;
}

/// `repository` in a manifest is either a shorthand string or an object with a url.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RepositoryField {
    Shorthand(String),
    Object { url: Option<String> },
}

impl RepositoryField {
    pub(crate) fn into_url(self) -> Option<String> {
        match self {
            RepositoryField::Shorthand(s) => Some(s),
            RepositoryField::Object { url } => url,
        }
    }
}

static GITHUB_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"github\.com[/:]([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?/?(?:#.*)?$")
        .expect("valid regex")
});

static SHORTHAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:github:)?([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?$").expect("valid regex")
});

/// Extract `(owner, repo)` from a repository URL as found in package manifests.
///
/// Handles `git+https://github.com/o/r.git`, `git@github.com:o/r.git`,
/// `github:o/r` and bare `o/r`.
pub fn parse_repository_url(url: &str) -> Option<(String, String)> {
    let url = url.trim();
    let caps = GITHUB_URL
        .captures(url)
        .or_else(|| SHORTHAND.captures(url))?;
    Some((caps[1].to_string(), caps[2].to_string()))
}
