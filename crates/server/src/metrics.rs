//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the scrivano server:
//! - HTTP request metrics (latency, counts, errors)
//! - SSE streaming connection metrics
//! - Task lifecycle metrics

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "scrivano_http_request_duration_seconds",
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
        Opts::new("scrivano_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "scrivano_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scrivano_auth_failures_total",
            "Total authentication failures",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// SSE Streaming Metrics
// =============================================================================

/// Active SSE subscriptions.
pub static SSE_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "scrivano_sse_connections_active",
        "Number of active SSE event subscriptions",
    )
    .unwrap()
});

/// Total SSE subscriptions (cumulative).
pub static SSE_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "scrivano_sse_connections_total",
        "Total SSE event subscriptions since startup",
    )
    .unwrap()
});

/// SSE events sent by kind.
pub static SSE_EVENTS_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("scrivano_sse_events_sent_total", "SSE events sent"),
        &["kind"],
    )
    .unwrap()
});

/// Subscribers disconnected for falling behind.
pub static SSE_BACKPRESSURE_DISCONNECTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "scrivano_sse_backpressure_disconnects_total",
        "SSE subscribers disconnected after exceeding their event buffer",
    )
    .unwrap()
});

// =============================================================================
// Task Metrics
// =============================================================================

/// Tasks created since startup.
pub static TASKS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("scrivano_tasks_created_total", "Tasks created").unwrap()
});

/// Task status transitions by target status.
pub static TASK_TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scrivano_task_transitions_total",
            "Task status transitions applied",
        ),
        &["to_status"],
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
    registry
        .register(Box::new(SSE_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(SSE_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry.register(Box::new(SSE_EVENTS_SENT.clone())).unwrap();
    registry
        .register(Box::new(SSE_BACKPRESSURE_DISCONNECTS.clone()))
        .unwrap();
    registry
        .register(Box::new(TASKS_CREATED_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(TASK_TRANSITIONS_TOTAL.clone()))
        .unwrap();
}

/// Render the registry in Prometheus text exposition format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collapse task ids in paths so metric label cardinality stays bounded.
///
/// `/api/v1/tasks/7b0c.../events` becomes `/api/v1/tasks/{id}/events`.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if looks_like_task_id(segment) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn looks_like_task_id(segment: &str) -> bool {
    segment.len() == 36
        && segment.chars().filter(|c| *c == '-').count() == 4
        && segment.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_uuids() {
        let path = "/api/v1/tasks/0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9/events";
        assert_eq!(normalize_path(path), "/api/v1/tasks/{id}/events");
    }

    #[test]
    fn test_normalize_path_keeps_static_segments() {
        assert_eq!(normalize_path("/api/v1/tasks"), "/api/v1/tasks");
        assert_eq!(
            normalize_path("/api/v1/tasks/not-a-uuid/data"),
            "/api/v1/tasks/not-a-uuid/data"
        );
    }

    #[test]
    fn test_render_includes_registered_metrics() {
        TASKS_CREATED_TOTAL.inc();
        let text = render();
        assert!(text.contains("scrivano_tasks_created_total"));
    }
}
