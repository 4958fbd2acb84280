use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::middleware::{maintenance_auth, metrics_middleware};
use super::tarball::tarball_middleware;
use super::{handlers, multipart, publish, retain, template, workflow};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Health and config
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config));

    // Gated by the maintenance secret
    let maintenance_routes = Router::new()
        .route("/retain", post(retain::retain))
        .route("/workflow", post(workflow::register_workflow))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            maintenance_auth,
        ));

    // Publishing; the payload ceiling is enforced per repository, not here
    let publish_routes = Router::new()
        .route("/publish", post(publish::publish))
        .route("/multipart/upload", post(multipart::upload_part))
        .layer(DefaultBodyLimit::disable())
        .route("/multipart/create", post(multipart::create_upload))
        .route("/multipart/complete", post(multipart::complete_upload))
        .route("/check", post(publish::check));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api_routes)
        .route("/metrics", get(handlers::metrics))
        .route("/template/{id}", get(template::get_template))
        .merge(publish_routes)
        .merge(maintenance_routes)
        .fallback(handlers::not_found)
        // Tarball URLs have no fixed shape, so they are matched ahead of routing
        .layer(middleware::from_fn_with_state(
            state.clone(),
            tarball_middleware,
        ))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
