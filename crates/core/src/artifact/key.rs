//! Structured artifact keys and their flat string encoding.
//!
//! Package keys encode as `package:owner:repo:commit:package`. Owner, repo and
//! commit may not contain the delimiter, so everything after the fourth
//! delimiter belongs to the package component. Scoped package names are
//! normalized from `@scope/name` to `@scope:name`.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

pub const PACKAGE_NAMESPACE: &str = "package";
pub const TEMPLATE_NAMESPACE: &str = "template";
pub const UPLOAD_NAMESPACE: &str = "upload";

const DELIMITER: char = ':';

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid {component}: {value:?}")]
    InvalidComponent {
        component: &'static str,
        value: String,
    },

    #[error("malformed key: {0}")]
    Malformed(String),
}

/// `@scope/name` -> `@scope:name`. Unscoped names are returned unchanged.
pub fn normalize_package_name(name: &str) -> String {
    name.replace('/', ":")
}

/// Inverse of [`normalize_package_name`].
pub fn display_package_name(normalized: &str) -> String {
    normalized.replacen(DELIMITER, "/", 1)
}

fn check_component(component: &'static str, value: &str) -> Result<(), KeyError> {
    if value.is_empty() || value.contains(DELIMITER) || value.contains('/') {
        return Err(KeyError::InvalidComponent {
            component,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Key of a published package tarball.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageKey {
    pub owner: String,
    pub repo: String,
    pub commit: String,
    /// Normalized package name.
    pub package: String,
}

impl PackageKey {
    pub fn new(owner: &str, repo: &str, commit: &str, package_name: &str) -> Result<Self, KeyError> {
        check_component("owner", owner)?;
        check_component("repo", repo)?;
        check_component("commit", commit)?;
        if package_name.is_empty() {
            return Err(KeyError::InvalidComponent {
                component: "package",
                value: String::new(),
            });
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            commit: commit.to_string(),
            package: normalize_package_name(package_name),
        })
    }

    pub fn encode(&self) -> String {
        format!(
            "{PACKAGE_NAMESPACE}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}",
            self.owner, self.repo, self.commit, self.package
        )
    }

    pub fn decode(key: &str) -> Result<Self, KeyError> {
        let rest = key
            .strip_prefix(PACKAGE_NAMESPACE)
            .and_then(|r| r.strip_prefix(DELIMITER))
            .ok_or_else(|| KeyError::Malformed(key.to_string()))?;

        let mut parts = rest.splitn(4, DELIMITER);
        let (Some(owner), Some(repo), Some(commit), Some(package)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(KeyError::Malformed(key.to_string()));
        };

        if owner.is_empty() || repo.is_empty() || commit.is_empty() || package.is_empty() {
            return Err(KeyError::Malformed(key.to_string()));
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            commit: commit.to_string(),
            package: package.to_string(),
        })
    }

    /// Package name as users write it (`@scope/name`).
    pub fn package_name(&self) -> String {
        display_package_name(&self.package)
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Listing prefix for every package stored under `owner/repo` at a commit
/// (or abbreviated commit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitPrefix {
    pub owner: String,
    pub repo: String,
    pub ref_or_sha: String,
}

impl CommitPrefix {
    pub fn new(owner: &str, repo: &str, ref_or_sha: &str) -> Result<Self, KeyError> {
        check_component("owner", owner)?;
        check_component("repo", repo)?;
        check_component("commit", ref_or_sha)?;
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            ref_or_sha: ref_or_sha.to_string(),
        })
    }

    pub fn listing_prefix(&self) -> String {
        format!(
            "{PACKAGE_NAMESPACE}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}",
            self.owner, self.repo, self.ref_or_sha
        )
    }

    /// Value of the `x-commit-key` response header.
    pub fn header_value(&self) -> String {
        format!(
            "{}{DELIMITER}{}{DELIMITER}{}",
            self.owner, self.repo, self.ref_or_sha
        )
    }

    /// Whether `key` lives under this prefix and names exactly `normalized_package`.
    pub fn selects(&self, key: &PackageKey, normalized_package: &str) -> bool {
        key.owner == self.owner
            && key.repo == self.repo
            && key.commit.starts_with(&self.ref_or_sha)
            && key.package == normalized_package
    }
}

/// Key of a template launch document or binary template asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    pub id: String,
}

impl TemplateKey {
    pub fn generate() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
        }
    }

    pub fn from_id(id: &str) -> Result<Self, KeyError> {
        Uuid::parse_str(id).map_err(|_| KeyError::InvalidComponent {
            component: "template id",
            value: id.to_string(),
        })?;
        Ok(Self { id: id.to_string() })
    }

    pub fn encode(&self) -> String {
        format!("{TEMPLATE_NAMESPACE}{DELIMITER}{}", self.id)
    }
}

/// Staging key of a chunked upload, `upload:owner:repo:<uuid>`.
///
/// The repository is part of the key so a staged object can only be published
/// under the ticket that opened it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadKey {
    pub owner: String,
    pub repo: String,
    pub id: String,
}

impl UploadKey {
    pub fn generate(owner: &str, repo: &str) -> Result<Self, KeyError> {
        check_component("owner", owner)?;
        check_component("repo", repo)?;
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            id: Uuid::new_v4().to_string(),
        })
    }

    pub fn encode(&self) -> String {
        format!(
            "{UPLOAD_NAMESPACE}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}",
            self.owner, self.repo, self.id
        )
    }

    pub fn decode(key: &str) -> Result<Self, KeyError> {
        let malformed = || KeyError::Malformed(key.to_string());
        let rest = key
            .strip_prefix(UPLOAD_NAMESPACE)
            .and_then(|r| r.strip_prefix(DELIMITER))
            .ok_or_else(malformed)?;

        let mut parts = rest.splitn(3, DELIMITER);
        let (Some(owner), Some(repo), Some(id)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(malformed());
        };
        check_component("owner", owner).map_err(|_| malformed())?;
        check_component("repo", repo).map_err(|_| malformed())?;
        Uuid::parse_str(id).map_err(|_| malformed())?;

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            id: id.to_string(),
        })
    }

    /// Whether this upload was opened for `owner/repo`.
    pub fn belongs_to(&self, owner: &str, repo: &str) -> bool {
        self.owner == owner && self.repo == repo
    }
}

impl fmt::Display for UploadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "a832a55d4b3e1e0e4d8d3a5b2c1f0e9d8c7b6a59";

    #[test]
    fn test_package_key_encoding() {
        let key = PackageKey::new("tinylibs", "tinybench", SHA, "tinybench").unwrap();
        assert_eq!(key.encode(), format!("package:tinylibs:tinybench:{SHA}:tinybench"));
        assert_eq!(PackageKey::decode(&key.encode()).unwrap(), key);
    }

    #[test]
    fn test_scoped_package_keeps_scope_delimiter() {
        let key = PackageKey::new("acme", "widgets", SHA, "@acme/widgets-core").unwrap();
        assert_eq!(key.package, "@acme:widgets-core");
        assert_eq!(
            key.encode(),
            format!("package:acme:widgets:{SHA}:@acme:widgets-core")
        );

        let decoded = PackageKey::decode(&key.encode()).unwrap();
        assert_eq!(decoded.commit, SHA);
        assert_eq!(decoded.package, "@acme:widgets-core");
        assert_eq!(decoded.package_name(), "@acme/widgets-core");
    }

    #[test]
    fn test_delimiter_in_owner_rejected() {
        let err = PackageKey::new("ac:me", "widgets", SHA, "widgets").unwrap_err();
        assert!(matches!(err, KeyError::InvalidComponent { component: "owner", .. }));
        assert!(CommitPrefix::new("acme", "wid:gets", "abc").is_err());
    }

    #[test]
    fn test_decode_rejects_other_namespaces() {
        assert!(PackageKey::decode("template:123").is_err());
        assert!(PackageKey::decode("package:acme:widgets").is_err());
        assert!(PackageKey::decode("packages:acme:widgets:abc:x").is_err());
    }

    #[test]
    fn test_commit_prefix_selects_exact_package() {
        let prefix = CommitPrefix::new("acme", "widgets", "a832a55").unwrap();
        assert_eq!(prefix.listing_prefix(), "package:acme:widgets:a832a55");
        assert_eq!(prefix.header_value(), "acme:widgets:a832a55");

        let core = PackageKey::new("acme", "widgets", SHA, "core").unwrap();
        let vue_core = PackageKey::new("acme", "widgets", SHA, "vue-core").unwrap();
        assert!(prefix.selects(&core, "core"));
        assert!(!prefix.selects(&vue_core, "core"));
    }

    #[test]
    fn test_template_key() {
        let key = TemplateKey::generate();
        assert!(key.encode().starts_with("template:"));
        assert_eq!(TemplateKey::from_id(&key.id).unwrap(), key);
        assert!(TemplateKey::from_id("not-a-uuid").is_err());
    }

    #[test]
    fn test_upload_key() {
        let key = UploadKey::generate("acme", "widgets").unwrap();
        let encoded = key.encode();
        assert!(encoded.starts_with("upload:acme:widgets:"));
        assert_eq!(UploadKey::decode(&encoded).unwrap(), key);
        assert!(key.belongs_to("acme", "widgets"));
        assert!(!key.belongs_to("acme", "gadgets"));

        assert!(UploadKey::generate("ac:me", "widgets").is_err());
        assert!(UploadKey::decode("upload:../../etc").is_err());
        assert!(UploadKey::decode(&format!("upload:acme:{}", key.id)).is_err());
        assert!(UploadKey::decode(&format!("package:acme:widgets:{SHA}:widgets")).is_err());
    }
}
