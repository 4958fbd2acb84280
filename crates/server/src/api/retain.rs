//! `POST /retain`: run a retention sweep on demand.

use axum::{body::Bytes, extract::State, Json};
use chrono::Utc;
use prpkg_core::artifact::ListCursor;
use prpkg_core::{ServiceError, SweepOptions, SweepReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Optional sweep bounds. An empty body sweeps the whole store.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetainRequest {
    /// Resume after this key, as returned in `nextCursor`.
    pub after: Option<String>,
    pub page_size: Option<u32>,
    pub max_pages: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RetainResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub report: SweepReport,
}

pub async fn retain(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<RetainResponse>> {
    let request: RetainRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RetainRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::malformed(format!("Invalid retain request: {e}")))?
    };

    let page_size = request
        .page_size
        .filter(|size| *size > 0)
        .unwrap_or(state.config().retention.page_size);
    let options = SweepOptions {
        start_after: request.after.as_deref().map(ListCursor::from_token),
        page_size,
        max_pages: request.max_pages,
    };

    let retention = state.retention();
    let report = tokio::task::spawn_blocking(move || retention.sweep(&options, Utc::now()))
        .await
        .map_err(|e| ServiceError::Internal(format!("Retention sweep panicked: {e}")))?
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    info!(
        "Retention sweep removed {} of {} scanned object(s)",
        report.removed.len(),
        report.scanned
    );
    Ok(Json(RetainResponse { ok: true, report }))
}
