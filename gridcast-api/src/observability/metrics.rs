//! Prometheus metrics for gridcast
//!
//! HTTP request metrics plus point-in-time broadcast and compositor gauges,
//! sampled when `/metrics` is scraped.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Instant;

use crate::http::AppState;

/// Global metrics registry
static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Total HTTP requests, labeled by method, path, and status code.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("failed to create http_requests_total")
});

/// HTTP request duration in seconds, labeled by method and path.
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["method", "path"],
    )
    .expect("failed to create http_request_duration_seconds")
});

/// Number of in-flight HTTP requests.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .expect("failed to create http_requests_in_flight")
});

/// Number of sessions in the registry.
pub static SESSIONS_TOTAL: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("broadcast_sessions_total", "Number of known sessions")
        .expect("failed to create broadcast_sessions_total")
});

/// Number of active sessions.
pub static SESSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("broadcast_sessions_active", "Number of active sessions")
        .expect("failed to create broadcast_sessions_active")
});

/// Whether a compositor is rendering right now (0 or 1).
pub static BROADCAST_LIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("broadcast_live", "Whether a compositor is currently live")
        .expect("failed to create broadcast_live")
});

/// Ticks rendered by the live compositor.
pub static COMPOSITOR_TICKS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("compositor_ticks", "Frames rendered by the live compositor")
        .expect("failed to create compositor_ticks")
});

/// Slot draw failures of the live compositor.
pub static COMPOSITOR_DRAW_FAILURES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "compositor_draw_failures",
        "Slot draw failures of the live compositor",
    )
    .expect("failed to create compositor_draw_failures")
});

/// Selected sources with a live publisher.
pub static SLOTS_LIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "compositor_slots_live",
        "Selected sources that currently have a publisher",
    )
    .expect("failed to create compositor_slots_live")
});

/// Register all metrics with the registry.
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("failed to register http_requests_total");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("failed to register http_request_duration_seconds");
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .expect("failed to register http_requests_in_flight");
    registry
        .register(Box::new(SESSIONS_TOTAL.clone()))
        .expect("failed to register broadcast_sessions_total");
    registry
        .register(Box::new(SESSIONS_ACTIVE.clone()))
        .expect("failed to register broadcast_sessions_active");
    registry
        .register(Box::new(BROADCAST_LIVE.clone()))
        .expect("failed to register broadcast_live");
    registry
        .register(Box::new(COMPOSITOR_TICKS.clone()))
        .expect("failed to register compositor_ticks");
    registry
        .register(Box::new(COMPOSITOR_DRAW_FAILURES.clone()))
        .expect("failed to register compositor_draw_failures");
    registry
        .register(Box::new(SLOTS_LIVE.clone()))
        .expect("failed to register compositor_slots_live");
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("failed to encode metrics");
    String::from_utf8(buffer).expect("metrics are valid UTF-8")
}

/// Normalize a request path for metric labels.
///
/// Session ids in the path become a placeholder so labels stay low
/// cardinality.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut result = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        let prev = if i > 0 { segments.get(i - 1) } else { None };
        let is_id = matches!(prev, Some(&"broadcasts")) && *segment != "active";
        if is_id && !segment.is_empty() {
            result.push("{id}");
        } else {
            result.push(segment);
        }
    }

    result.join("/")
}

/// Middleware that records HTTP request count, duration, and in-flight gauge.
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);
    HTTP_REQUESTS_IN_FLIGHT.dec();

    response
}

/// Scrape endpoint: refresh the broadcast gauges, then encode everything.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.registry.list().await;
    SESSIONS_TOTAL.set(sessions.len() as i64);
    SESSIONS_ACTIVE.set(sessions.iter().filter(|s| s.active).count() as i64);

    match state.controller.active_stats().await {
        Some(stats) => {
            BROADCAST_LIVE.set(1);
            COMPOSITOR_TICKS.set(stats.ticks as i64);
            COMPOSITOR_DRAW_FAILURES.set(stats.draw_failures as i64);
            SLOTS_LIVE.set(stats.slots.iter().filter(|s| s.live).count() as i64);
        }
        None => {
            BROADCAST_LIVE.set(0);
            SLOTS_LIVE.set(0);
        }
    }

    gather_metrics()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_hides_session_ids() {
        assert_eq!(
            normalize_path("/api/broadcasts/aB3dE5fG7hI9"),
            "/api/broadcasts/{id}"
        );
        assert_eq!(
            normalize_path("/api/broadcasts/aB3dE5fG7hI9/stop"),
            "/api/broadcasts/{id}/stop"
        );
        assert_eq!(
            normalize_path("/api/broadcasts/active"),
            "/api/broadcasts/active"
        );
        assert_eq!(normalize_path("/api/auth/login"), "/api/auth/login");
    }
}
