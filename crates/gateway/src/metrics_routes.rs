//! Prometheus scrape endpoint and per-request HTTP metrics.

use std::time::Instant;

use {
    axum::{
        extract::{MatchedPath, Request, State},
        http::{StatusCode, header},
        middleware::Next,
        response::{IntoResponse, Response},
    },
    calbridge_metrics::{counter, histogram, http, labels},
};

use crate::server::AppState;

/// Metrics in Prometheus text exposition format.
///
/// Unauthenticated so scrapers can reach it.
pub async fn prometheus_metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics_handle.as_ref().filter(|h| h.is_enabled()) {
        Some(handle) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not enabled".to_string(),
        ),
    }
}

/// Count requests and time them, labelled by route template.
pub async fn record_http_metrics(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    counter!(
        http::REQUESTS_TOTAL,
        labels::ENDPOINT => endpoint.clone(),
        labels::METHOD => method.clone(),
        labels::STATUS => status
    )
    .increment(1);
    histogram!(
        http::REQUEST_DURATION_SECONDS,
        labels::ENDPOINT => endpoint,
        labels::METHOD => method
    )
    .record(started.elapsed().as_secs_f64());
    response
}
