//! `POST /publish` and `POST /check`.

use axum::{
    extract::{multipart::Field, Multipart, State},
    http::{header, HeaderMap},
    Json,
};
use prpkg_core::publish::{CheckResponse, PackageSource, PackageUpload, TemplateAsset};
use prpkg_core::{CommentPolicy, PresentationFlags, PublishRequest, PublishResponse};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::{ApiError, ApiResult};
use super::headers;
use crate::state::AppState;

const PACKAGE_FIELD_PREFIX: &str = "package:";
const TEMPLATE_FIELD_PREFIX: &str = "template:";
const STAGED_REFERENCE_PREFIX: &str = "object:";

/// Everything the publish headers carry besides the ticket key.
#[derive(Debug)]
struct PublishHeaders {
    key: String,
    declared_size: Option<u64>,
    ordering_number: Option<u64>,
    content_hashes: HashMap<String, String>,
    flags: PresentationFlags,
}

impl PublishHeaders {
    fn parse(map: &HeaderMap) -> ApiResult<Self> {
        let key = headers::required(map, headers::PUBLISH_KEY)?.to_string();
        let declared_size = headers::optional_u64(map, header::CONTENT_LENGTH.as_str())?;
        let ordering_number = headers::optional_u64(map, headers::RUN_ID)?;

        let content_hashes = match headers::optional(map, headers::CONTENT_HASHES)? {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw).map_err(|e| {
                ApiError::malformed(format!(
                    "Header {} is not a JSON object: {e}",
                    headers::CONTENT_HASHES
                ))
            })?,
            _ => HashMap::new(),
        };

        let comment = headers::optional(map, headers::COMMENT)?
            .unwrap_or_default()
            .parse::<CommentPolicy>()
            .map_err(ApiError::malformed)?;

        Ok(Self {
            key,
            declared_size,
            ordering_number,
            content_hashes,
            flags: PresentationFlags {
                comment,
                compact: headers::flag(map, headers::COMPACT)?,
                bin: headers::flag(map, headers::BIN)?,
            },
        })
    }
}

/// Publish the packages of one CI run.
///
/// The ticket is consumed before the body is read, so a retried request with
/// the same key is rejected even when the first attempt failed later on. A
/// declared `content-length` is held to the ceiling up front; the service
/// checks the actual payload, staged uploads included.
pub async fn publish(
    State(state): State<Arc<AppState>>,
    header_map: HeaderMap,
    multipart: Multipart,
) -> ApiResult<Json<PublishResponse>> {
    let parsed = PublishHeaders::parse(&header_map)?;
    let publisher = state.publisher();

    let ticket = publisher
        .authorize(&parsed.key, parsed.declared_size)
        .await?;

    let mut request = PublishRequest {
        ordering_number: parsed.ordering_number,
        content_hashes: parsed.content_hashes,
        flags: parsed.flags,
        ..Default::default()
    };
    read_payload(multipart, &mut request).await?;

    let response = publisher.publish(&ticket, request).await?;
    Ok(Json(response))
}

async fn read_payload(mut multipart: Multipart, request: &mut PublishRequest) -> ApiResult<()> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::malformed(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(package) = name.strip_prefix(PACKAGE_FIELD_PREFIX) {
            let bytes = field_bytes(field).await?;
            request.packages.push(PackageUpload {
                name: package.to_string(),
                source: package_source(bytes),
            });
        } else if let Some(rest) = name.strip_prefix(TEMPLATE_FIELD_PREFIX) {
            let (template, path) = rest
                .split_once(':')
                .filter(|(template, path)| !template.is_empty() && !path.is_empty())
                .ok_or_else(|| ApiError::malformed(format!("Invalid template field {name}")))?;
            let (template, path) = (template.to_string(), path.to_string());
            request.templates.push(TemplateAsset {
                template,
                path,
                bytes: field_bytes(field).await?,
            });
        } else {
            warn!("Ignoring unknown publish field {:?}", name);
        }
    }

    debug!(
        "Publish payload: {} package(s), {} template asset(s)",
        request.packages.len(),
        request.templates.len()
    );
    Ok(())
}

async fn field_bytes(field: Field<'_>) -> ApiResult<Vec<u8>> {
    field
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|e| ApiError::malformed(format!("Failed to read multipart field: {e}")))
}

/// A field whose whole value is `object:<key>` refers to a completed chunked upload.
fn package_source(bytes: Vec<u8>) -> PackageSource {
    match std::str::from_utf8(&bytes)
        .ok()
        .and_then(|text| text.trim().strip_prefix(STAGED_REFERENCE_PREFIX))
    {
        Some(key) => PackageSource::Staged(key.to_string()),
        None => PackageSource::Inline(bytes),
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub key: String,
}

pub async fn check(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CheckRequest>,
) -> ApiResult<Json<CheckResponse>> {
    let response = state.publisher().check(&body.key).await?;
    Ok(Json(response))
}
