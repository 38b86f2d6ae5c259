//! Gemini call metrics.

use metrics::{counter, histogram};

pub mod names {
    /// Gemini calls by operation, model and outcome.
    pub const REQUESTS_TOTAL: &str = "gemini_requests_total";

    /// Call latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "gemini_latency_seconds";

    /// Times a content model failed and the next one was tried.
    pub const FALLBACKS_TOTAL: &str = "gemini_model_fallbacks_total";
}

pub fn record_request(operation: &'static str, model: &str, outcome: &'static str, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation,
        "model" => model.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(names::LATENCY_SECONDS, "operation" => operation).record(latency_ms / 1000.0);
}

pub fn record_fallback(from_model: &str) {
    counter!(names::FALLBACKS_TOTAL, "from_model" => from_model.to_string()).increment(1);
}
