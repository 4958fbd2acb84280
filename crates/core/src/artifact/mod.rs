//! Blob storage for package tarballs and template documents.

mod key;
mod sqlite;
mod types;

pub use key::*;
pub use sqlite::SqliteArtifactStore;
pub use types::*;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Part numbers accepted by chunked uploads.
pub const MAX_PART_NUMBER: u32 = 10_000;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Upload session not found: {0}")]
    UploadNotFound(String),

    #[error("Invalid part number {0}, expected 1..={MAX_PART_NUMBER}")]
    InvalidPart(u32),

    #[error("Upload {0} has no parts")]
    EmptyUpload(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Trait for artifact storage backends.
///
/// Keys are flat strings produced by the key types in this module.
pub trait ArtifactStore: Send + Sync {
    /// Store an object, replacing any object under the same key.
    fn put(&self, key: &str, bytes: &[u8], options: PutOptions)
        -> Result<ArtifactMeta, ArtifactError>;

    fn get(&self, key: &str) -> Result<Option<StoredArtifact>, ArtifactError>;

    fn head(&self, key: &str) -> Result<Option<ArtifactMeta>, ArtifactError>;

    /// List objects whose key starts with `prefix`, in key order, after `cursor`.
    fn list(
        &self,
        prefix: &str,
        cursor: Option<&ListCursor>,
        limit: u32,
    ) -> Result<ListPage, ArtifactError>;

    /// Delete an object. Returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool, ArtifactError>;

    /// Open a chunked upload that will be assembled into `key`.
    fn create_upload(&self, key: &str) -> Result<UploadSession, ArtifactError>;

    /// Store one part. Parts may arrive in any order; a repeated part number replaces the earlier one.
    fn upload_part(
        &self,
        upload_id: &str,
        part_number: u32,
        bytes: &[u8],
    ) -> Result<PartReceipt, ArtifactError>;

    fn upload_session(&self, upload_id: &str) -> Result<Option<UploadSession>, ArtifactError>;

    /// Concatenate parts in part-number order into the session key and close the session.
    fn complete_upload(&self, upload_id: &str) -> Result<ArtifactMeta, ArtifactError>;

    /// Drop a session and its parts. Returns whether it existed.
    fn abort_upload(&self, upload_id: &str) -> Result<bool, ArtifactError>;

    /// Drop every session opened before `before`. Returns how many were dropped.
    fn expire_uploads(&self, before: DateTime<Utc>) -> Result<u64, ArtifactError>;
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
