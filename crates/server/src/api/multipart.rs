//! Chunked uploads for packages too large for a single publish body.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ApiResult};
use super::headers;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUploadRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUploadResponse {
    pub ok: bool,
    pub upload_id: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPartResponse {
    pub ok: bool,
    pub part_number: u32,
    pub etag: String,
}

#[derive(Debug, Serialize)]
pub struct CompleteUploadResponse {
    pub ok: bool,
    pub key: String,
    pub size: u64,
}

/// Open a staging upload. The caller must hold a live workflow ticket, and only
/// that ticket's repository may publish the result.
pub async fn create_upload(
    State(state): State<Arc<AppState>>,
    header_map: HeaderMap,
    Json(body): Json<CreateUploadRequest>,
) -> ApiResult<Json<CreateUploadResponse>> {
    let ticket_key = headers::required(&header_map, headers::PUBLISH_KEY)?;
    let (ticket, session) = state.publisher().open_upload(ticket_key)?;
    info!(
        "Opened upload {} for {} ({}/{})",
        session.upload_id, body.name, ticket.owner, ticket.repo
    );

    Ok(Json(CreateUploadResponse {
        ok: true,
        upload_id: session.upload_id,
        key: session.key,
    }))
}

pub async fn upload_part(
    State(state): State<Arc<AppState>>,
    header_map: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<UploadPartResponse>> {
    let upload_id = headers::required(&header_map, headers::UPLOAD_ID)?;
    let part_number = headers::optional_u64(&header_map, headers::PART_NUMBER)?
        .ok_or_else(|| ApiError::malformed(format!("Missing {} header", headers::PART_NUMBER)))?;
    let part_number = u32::try_from(part_number)
        .map_err(|_| ApiError::malformed(format!("Invalid part number {part_number}")))?;

    let receipt = state
        .publisher()
        .upload_part(upload_id, part_number, &body)
        .await?;

    Ok(Json(UploadPartResponse {
        ok: true,
        part_number: receipt.part_number,
        etag: receipt.etag,
    }))
}

pub async fn complete_upload(
    State(state): State<Arc<AppState>>,
    header_map: HeaderMap,
) -> ApiResult<Json<CompleteUploadResponse>> {
    let upload_id = headers::required(&header_map, headers::UPLOAD_ID)?;
    let meta = state.publisher().complete_upload(upload_id).await?;
    info!("Completed upload {} into {} ({} bytes)", upload_id, meta.key, meta.size);

    Ok(Json(CompleteUploadResponse {
        ok: true,
        key: meta.key,
        size: meta.size,
    }))
}
