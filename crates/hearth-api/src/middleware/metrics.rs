//! # Request Metrics
//!
//! Counts every authenticated-surface request by method and status, and
//! records its latency. Values go to whatever `metrics` recorder is
//! installed; the server binary installs the Prometheus exporter.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().as_str().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        "hearth_http_requests_total",
        "method" => method.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!("hearth_http_request_duration_seconds", "method" => method)
        .record(started.elapsed().as_secs_f64());

    response
}
