use std::collections::HashMap;

use serde::Serialize;

use crate::notifier::PresentationFlags;

/// Where a package's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    /// Sent in the publish body.
    Inline(Vec<u8>),
    /// A completed chunked upload, referenced by its staging key.
    Staged(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUpload {
    pub name: String,
    pub source: PackageSource,
}

/// One file of a named template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateAsset {
    pub template: String,
    pub path: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    /// Run ordering number; falls back to the ticket's when absent.
    pub ordering_number: Option<u64>,
    /// Package name to lowercase hex SHA-256.
    pub content_hashes: HashMap<String, String>,
    pub packages: Vec<PackageUpload>,
    pub templates: Vec<TemplateAsset>,
    pub flags: PresentationFlags,
}

impl PublishRequest {
    /// Bytes carried inline by this request.
    pub fn inline_size(&self) -> u64 {
        let packages: usize = self
            .packages
            .iter()
            .map(|p| match &p.source {
                PackageSource::Inline(bytes) => bytes.len(),
                PackageSource::Staged(_) => 0,
            })
            .sum();
        let templates: usize = self.templates.iter().map(|t| t.bytes.len()).sum();
        (packages + templates) as u64
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublishResponse {
    pub ok: bool,
    /// One download URL per package, in request order.
    pub urls: Vec<String>,
    /// Launch document URL per template name.
    pub templates: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckResponse {
    pub ok: bool,
    pub sha: String,
}
