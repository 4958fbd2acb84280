//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Tarball resolution outcomes
//! - Publishing (packages, templates, notifier failures)
//! - Retention sweeps and background jobs
//! - Collaborator latency (registry, notifier)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Resolver
// =============================================================================

/// Tarball resolutions by outcome.
pub static TARBALL_RESOLUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "prpkg_tarball_resolutions_total",
            "Tarball requests by resolution outcome",
        ),
        &["outcome"], // "served", "redirect", "not_found", "passthrough", "error"
    )
    .unwrap()
});

/// Cursor lookups by result.
pub static CURSOR_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("prpkg_cursor_lookups_total", "Ref cursor lookups"),
        &["result"], // "hit", "miss"
    )
    .unwrap()
});

// =============================================================================
// Publish
// =============================================================================

/// Packages stored by publish.
pub static PACKAGES_PUBLISHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("prpkg_packages_published_total", "Total packages published").unwrap()
});

/// Template launch documents stored by publish.
pub static TEMPLATES_PUBLISHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "prpkg_templates_published_total",
        "Total template launch documents published",
    )
    .unwrap()
});

/// Publish requests rejected before any artifact was written.
pub static PUBLISH_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("prpkg_publish_rejections_total", "Rejected publish requests"),
        &["reason"], // "unauthorized", "too_large", "malformed"
    )
    .unwrap()
});

/// Notifier steps that failed or timed out.
pub static NOTIFIER_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "prpkg_notifier_failures_total",
            "Non-fatal notifier failures during publish",
        ),
        &["step"], // "check", "pull_request", "comment"
    )
    .unwrap()
});

// =============================================================================
// Retention and background work
// =============================================================================

/// Objects deleted by retention, by rule.
pub static RETENTION_DELETIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "prpkg_retention_deletions_total",
            "Objects deleted by the retention sweep",
        ),
        &["rule"], // "hard_expiry", "idle"
    )
    .unwrap()
});

/// Objects examined by retention.
pub static RETENTION_SCANNED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "prpkg_retention_scanned_total",
        "Objects examined by the retention sweep",
    )
    .unwrap()
});

/// Background jobs dropped because the queue was full or closed.
pub static BACKGROUND_JOBS_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "prpkg_background_jobs_dropped_total",
        "Background jobs that could not be queued",
    )
    .unwrap()
});

// =============================================================================
// External services
// =============================================================================

/// Collaborator call duration in seconds.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "prpkg_external_service_duration_seconds",
            "Duration of collaborator calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["service", "operation"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Resolver
        Box::new(TARBALL_RESOLUTIONS.clone()),
        Box::new(CURSOR_LOOKUPS.clone()),
        // Publish
        Box::new(PACKAGES_PUBLISHED.clone()),
        Box::new(TEMPLATES_PUBLISHED.clone()),
        Box::new(PUBLISH_REJECTIONS.clone()),
        Box::new(NOTIFIER_FAILURES.clone()),
        // Retention
        Box::new(RETENTION_DELETIONS.clone()),
        Box::new(RETENTION_SCANNED.clone()),
        Box::new(BACKGROUND_JOBS_DROPPED.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
    ]
}
