//! Axum HTTP API server.
//!
//! This crate provides:
//! - Staged and direct media ingestion into the model file store
//! - The analyze → generate content pipelines (video and image)
//! - The credit ledger and Stripe / Clerk webhook reconciliation
//! - Clerk session verification, rate limiting and security headers
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{Adapters, AppState};
