//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return the render handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "remix_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "remix_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "remix_http_requests_in_flight";

    // Pipelines
    pub const PIPELINE_STAGES_TOTAL: &str = "remix_pipeline_stages_total";
    pub const INGEST_POLLS: &str = "remix_ingest_polls";
    pub const INGEST_DURATION_SECONDS: &str = "remix_ingest_duration_seconds";
    pub const INGEST_BYTES: &str = "remix_ingest_bytes";

    // Billing
    pub const LEDGER_MUTATIONS_TOTAL: &str = "remix_ledger_mutations_total";
    pub const WEBHOOK_EVENTS_TOTAL: &str = "remix_webhook_events_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "remix_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a pipeline stage outcome (`ok` or an error kind).
pub fn record_stage(pipeline: &'static str, stage: &'static str, outcome: &'static str) {
    counter!(
        names::PIPELINE_STAGES_TOTAL,
        "pipeline" => pipeline,
        "stage" => stage,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a finished ingestion.
pub fn record_ingestion(outcome: &'static str, polls: u32, bytes: u64, duration_secs: f64) {
    histogram!(names::INGEST_POLLS, "outcome" => outcome).record(polls as f64);
    histogram!(names::INGEST_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
    histogram!(names::INGEST_BYTES).record(bytes as f64);
}

/// Record a credit balance mutation.
pub fn record_ledger_mutation(reason: &'static str, outcome: &'static str) {
    counter!(names::LEDGER_MUTATIONS_TOTAL, "reason" => reason, "outcome" => outcome).increment(1);
}

/// Record a webhook delivery.
pub fn record_webhook_event(source: &'static str, event_type: &str, outcome: &'static str) {
    counter!(
        names::WEBHOOK_EVENTS_TOTAL,
        "source" => source,
        "type" => event_type.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Route template for labels, so raw paths never explode cardinality.
fn route_label(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = route_label(&request);
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_label_without_match() {
        let request = Request::builder()
            .uri("/api/profile/550e8400-e29b-41d4-a716-446655440000")
            .body(Body::empty())
            .unwrap();
        assert_eq!(route_label(&request), "unmatched");
    }
}
