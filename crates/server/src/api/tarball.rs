//! Tarball reads, answered before normal routing.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use prpkg_core::{Resolution, ResolvedArtifact};
use std::sync::Arc;

use super::error::ApiError;
use crate::state::AppState;

pub const COMMIT_KEY_HEADER: &str = "x-commit-key";
pub const PACKAGE_KEY_HEADER: &str = "x-pkg-name-key";

/// HTTP-date as used by `last-modified`.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Serve `GET`/`HEAD` requests that name a tarball; pass everything else on.
pub async fn tarball_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().as_str().to_owned();
    let path = request.uri().path().to_owned();

    match state.resolver().resolve(&method, &path).await {
        Ok(Resolution::Passthrough) => next.run(request).await,
        Ok(Resolution::Redirect { location }) => redirect(&location),
        Ok(Resolution::Artifact(artifact)) => artifact_response(artifact),
        Err(e) => ApiError(e).into_response(),
    }
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => ApiError::malformed(format!("Cannot redirect to {location}")).into_response(),
    }
}

fn artifact_response(artifact: ResolvedArtifact) -> Response {
    let meta = &artifact.meta;
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &meta.content_type)
        .header(header::CONTENT_LENGTH, meta.size)
        .header(header::ETAG, format!("\"{}\"", meta.etag))
        .header(
            header::LAST_MODIFIED,
            meta.uploaded_at.format(HTTP_DATE_FORMAT).to_string(),
        );

    // Keys may carry characters a header cannot; omit rather than fail the read.
    if let Ok(value) = HeaderValue::from_str(&artifact.commit_key) {
        builder = builder.header(COMMIT_KEY_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&artifact.package_key) {
        builder = builder.header(PACKAGE_KEY_HEADER, value);
    }

    let body = match artifact.body {
        Some(bytes) => Body::from(bytes),
        None => Body::empty(),
    };

    builder.body(body).unwrap_or_else(|e| {
        tracing::error!("Failed to build tarball response for {}: {}", meta.key, e);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}
