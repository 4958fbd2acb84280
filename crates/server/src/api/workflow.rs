//! `POST /workflow`: register the ticket for a CI run.

use axum::{extract::State, Json};
use prpkg_core::artifact::CommitPrefix;
use prpkg_core::{RegisterWorkflowRequest, ServiceError};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RegisterWorkflowResponse {
    pub ok: bool,
    pub key: String,
}

pub async fn register_workflow(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterWorkflowRequest>,
) -> ApiResult<Json<RegisterWorkflowResponse>> {
    for (field, value) in [
        ("runUrl", &body.run_url),
        ("owner", &body.owner),
        ("repo", &body.repo),
        ("commit", &body.commit),
        ("ref", &body.git_ref),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::malformed(format!("{field} must not be empty")));
        }
    }

    // Components end up in artifact keys
    CommitPrefix::new(&body.owner, &body.repo, &body.commit).map_err(ServiceError::from)?;

    let ticket = body.into_ticket();
    state
        .workflows()
        .register(&ticket)
        .map_err(ServiceError::from)?;
    info!(
        "Registered workflow for {}/{}@{} (run {})",
        ticket.owner, ticket.repo, ticket.commit, ticket.ordering_number
    );

    Ok(Json(RegisterWorkflowResponse {
        ok: true,
        key: ticket.key,
    }))
}
