//! Prometheus metrics for observability.
//!
//! HTTP request metrics live here; service metrics are defined in
//! `prpkg_core::metrics` and registered into the same registry.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "prpkg_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("prpkg_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "prpkg_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Rejected calls to maintenance endpoints.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "prpkg_auth_failures_total",
            "Total maintenance authentication failures",
        ),
        &["reason"],
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();

    for metric in prpkg_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

// Everything from the ref separator to the end of a tarball path.
static TARBALL_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^/])@[^/]*$").unwrap());

/// Normalize a path for metric labels.
///
/// Upload ids and template ids become `{id}`. Tarball paths keep only their
/// shape (`/{owner}/{repo}/{pkg}@{ref}`) so the label set stays bounded.
pub fn normalize_path(path: &str) -> String {
    let path = UUID_RE.replace_all(path, "{id}");

    let reserved = matches!(
        path.trim_start_matches('/').split('/').next(),
        Some(
            "api" | "~" | "metrics" | "publish" | "multipart" | "check" | "retain" | "workflow"
                | "template"
        )
    );
    if reserved || !TARBALL_REF_RE.is_match(&path) {
        return path.into_owned();
    }

    let segments = path.trim_start_matches('/').split('/').count();
    let package_segments = if path.contains("/@") { 2 } else { 1 };
    match segments.saturating_sub(package_segments) {
        0 => "/{pkg}@{ref}".to_string(),
        1 => "/{repo}@{ref}".to_string(),
        2 => "/{owner}/{repo}/{pkg}@{ref}".to_string(),
        _ => "/{other}".to_string(),
    }
}
