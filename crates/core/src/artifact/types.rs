use chrono::{DateTime, Utc};
use serde::Serialize;

/// Media type served for package tarballs.
pub const TARBALL_CONTENT_TYPE: &str = "application/tar+gzip";

/// Metadata kept alongside every stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMeta {
    pub key: String,
    pub size: u64,
    /// Content hash when one was supplied at upload, otherwise SHA-256 of the bytes.
    pub etag: String,
    pub content_hash: Option<String>,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Object bytes plus metadata.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub meta: ArtifactMeta,
    pub bytes: Vec<u8>,
}

/// Options for `ArtifactStore::put`.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub content_hash: Option<String>,
    pub content_type: Option<String>,
    /// Overrides the upload timestamp (imports and tests).
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl PutOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn uploaded_at(mut self, at: DateTime<Utc>) -> Self {
        self.uploaded_at = Some(at);
        self
    }
}

/// Opaque continuation token for paginated listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListCursor(String);

impl ListCursor {
    /// Continue listing strictly after `key`.
    pub fn after(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_token(token: &str) -> Self {
        Self(token.to_string())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ArtifactMeta>,
    /// Present when more objects may follow.
    pub cursor: Option<ListCursor>,
}

/// Acknowledgement of one uploaded part.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartReceipt {
    pub part_number: u32,
    pub etag: String,
}

/// An open chunked upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub upload_id: String,
    pub key: String,
    pub created_at: DateTime<Utc>,
    /// Total size of the parts received so far.
    pub received_bytes: u64,
}
