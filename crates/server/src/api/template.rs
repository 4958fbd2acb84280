//! `GET /template/{id}`: launch documents and binary template assets.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use prpkg_core::{BackgroundJob, ServiceError, TemplateKey};
use std::sync::Arc;

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let key = TemplateKey::from_id(&id)
        .map_err(|_| ApiError::not_found("template not found"))?
        .encode();

    let stored = state
        .artifacts()
        .get(&key)
        .map_err(ServiceError::from)?
        .ok_or_else(|| ApiError::not_found("template not found"))?;

    state.background().try_submit(BackgroundJob::RecordDownload {
        key,
        at: Utc::now(),
    });

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, stored.meta.content_type),
            (header::ETAG, format!("\"{}\"", stored.meta.etag)),
        ],
        stored.bytes,
    )
        .into_response())
}
