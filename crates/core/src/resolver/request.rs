//! Tarball URL parsing.
//!
//! Three shapes are recognized, all ending in `@<ref or sha>` with an
//! optional `.tgz` suffix:
//!
//! - full: `/owner/repo/pkg@ref` (pkg may be `@scope/name`)
//! - short: `/owner/repo@ref`, the repository name doubling as package name
//! - compact: `/pkg@ref`, owner and repository recovered from the npm registry

use crate::error::{ServiceError, ServiceResult};

/// Root segments that never name a package.
pub const RESERVED_SEGMENTS: [&str; 2] = ["~", "api"];

const ARCHIVE_EXTENSION: &str = ".tgz";

/// Length of abbreviated commits in generated URLs.
pub const ABBREVIATED_COMMIT_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMethod {
    Get,
    Head,
}

impl ReadMethod {
    /// `None` for methods the resolver does not handle.
    pub fn from_name(method: &str) -> Option<Self> {
        match method {
            "GET" => Some(ReadMethod::Get),
            "HEAD" => Some(ReadMethod::Head),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlShape {
    Full,
    Short,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarballPath {
    /// `None` for the compact shape.
    pub owner: Option<String>,
    pub repo: Option<String>,
    /// Package name as written, `@scope/name` for scoped packages.
    pub package: String,
    pub ref_or_sha: String,
    pub shape: UrlShape,
}

/// 40 (SHA-1) or 64 (SHA-256) hex characters.
pub fn is_full_commit_hash(value: &str) -> bool {
    matches!(value.len(), 40 | 64) && value.bytes().all(|b| b.is_ascii_hexdigit())
}

pub fn abbreviate_commit(commit: &str) -> &str {
    match commit.char_indices().nth(ABBREVIATED_COMMIT_LEN) {
        Some((idx, _)) => &commit[..idx],
        None => commit,
    }
}

/// Index of the `@` separating the package path from the ref.
///
/// The last `@` at byte index 2 or later that does not directly follow a `/`,
/// so a leading `@scope/` segment is never mistaken for the separator.
fn find_separator(path: &str) -> Option<usize> {
    let bytes = path.as_bytes();
    (2..bytes.len())
        .rev()
        .find(|&i| bytes[i] == b'@' && bytes[i - 1] != b'/')
}

/// Parse a request path. `Ok(None)` means the path is not a tarball request.
pub fn parse_tarball_path(raw_path: &str) -> ServiceResult<Option<TarballPath>> {
    let decoded = urlencoding::decode(raw_path)
        .map_err(|_| ServiceError::MalformedRequest("Malformed URL encoding".to_string()))?;

    let root = decoded.trim_start_matches('/').split('/').next().unwrap_or("");
    if RESERVED_SEGMENTS.contains(&root) {
        return Ok(None);
    }

    let path = decoded.strip_suffix(ARCHIVE_EXTENSION).unwrap_or(&decoded);

    let Some(separator) = find_separator(path) else {
        return Ok(None);
    };
    let ref_or_sha = &path[separator + 1..];
    if ref_or_sha.is_empty() {
        return Ok(None);
    }

    let segments: Vec<&str> = path[..separator].trim_start_matches('/').split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Ok(None);
    }

    let (package, rest, scoped) = match segments.as_slice() {
        [rest @ .., scope, name] if scope.starts_with('@') => {
            (format!("{scope}/{name}"), rest, true)
        }
        [rest @ .., name] => (name.to_string(), rest, false),
        [] => return Ok(None),
    };

    let parsed = match rest {
        [] => TarballPath {
            owner: None,
            repo: None,
            package,
            ref_or_sha: ref_or_sha.to_string(),
            shape: UrlShape::Compact,
        },
        [owner] if !scoped => TarballPath {
            owner: Some(owner.to_string()),
            repo: Some(package.clone()),
            package,
            ref_or_sha: ref_or_sha.to_string(),
            shape: UrlShape::Short,
        },
        [owner, repo] => TarballPath {
            owner: Some(owner.to_string()),
            repo: Some(repo.to_string()),
            package,
            ref_or_sha: ref_or_sha.to_string(),
            shape: UrlShape::Full,
        },
        _ => return Ok(None),
    };

    Ok(Some(parsed))
}

/// `/owner/repo/pkg@ref`, the form every other shape redirects to.
pub fn canonical_path(owner: &str, repo: &str, package: &str, ref_or_sha: &str) -> String {
    format!(
        "/{owner}/{repo}/{package}@{}",
        urlencoding::encode(ref_or_sha)
    )
}

/// Shortest public path for a package: the short form when the package is
/// named after its repository.
pub fn public_path(owner: &str, repo: &str, package: &str, commit: &str) -> String {
    let commit = abbreviate_commit(commit);
    if package == repo {
        format!("/{owner}/{repo}@{commit}")
    } else {
        format!("/{owner}/{repo}/{package}@{commit}")
    }
}
