//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::{
    analyze, analyze_image, clerk_webhook, create_checkout_session, create_portal_session,
    create_signed_url, create_top_up_checkout_session, decrement_credits, generate,
    generate_content, generate_image_content, get_profile, get_video_duration, health, ready,
    stripe_webhook, transfer_to_gemini, upload_video,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let config = Arc::clone(&state.config);

    // Short request/response routes
    let quick_routes = Router::new()
        .route("/create-signed-url", post(create_signed_url))
        .route("/get-video-duration", post(get_video_duration))
        .route("/profile", get(get_profile))
        .route("/credits/decrement", post(decrement_credits))
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/create-top-up-checkout-session", post(create_top_up_checkout_session))
        .route("/create-portal-session", post(create_portal_session))
        .layer(TimeoutLayer::new(config.request_timeout));

    // Model-bound routes; ingestion polling bounds these, not a transport timeout
    let pipeline_routes = Router::new()
        .route("/transfer-to-gemini", post(transfer_to_gemini))
        .route("/generate", post(generate))
        .route("/analyze", post(analyze))
        .route("/generate-content", post(generate_content));

    // Routes that accept media bodies
    let upload_routes = Router::new()
        .route("/upload-video", post(upload_video))
        .route("/analyze-image", post(analyze_image))
        .route("/generate-image-content", post(generate_image_content))
        .layer(DefaultBodyLimit::max(config.max_upload_size))
        .layer(RequestBodyLimitLayer::new(config.max_upload_size));

    let rate_limiter = Arc::new(RateLimiterCache::new(config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(quick_routes)
        .merge(pipeline_routes)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .merge(upload_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    // Provider callbacks: signed, not rate limited per IP
    let webhook_routes = Router::new()
        .route("/clerk-webhook", post(clerk_webhook))
        .route("/stripe-webhook", post(stripe_webhook))
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(RequestBodyLimitLayer::new(config.max_body_size));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes.merge(webhook_routes))
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&config.cors_origins))
        .with_state(state)
}
