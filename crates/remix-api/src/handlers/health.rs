//! Liveness and readiness probes.

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// Liveness: the process is serving requests.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyState {
    Ok,
    Error,
}

/// Result of probing one backing service.
#[derive(Serialize)]
pub struct DependencyCheck {
    pub status: DependencyState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DependencyCheck {
    async fn probe<F, E>(name: &'static str, fut: F) -> Self
    where
        F: Future<Output = Result<(), E>>,
        E: Display,
    {
        let start = Instant::now();
        match fut.await {
            Ok(()) => Self {
                status: DependencyState::Ok,
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: None,
            },
            Err(e) => {
                warn!(dependency = name, error = %e, "Readiness probe failed");
                Self {
                    status: DependencyState::Error,
                    latency_ms: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn is_ok(&self) -> bool {
        self.status == DependencyState::Ok
    }
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub storage: DependencyCheck,
    pub profiles: DependencyCheck,
}

/// Readiness: object storage and the profile store both answer.
/// Degraded dependencies yield 503 with the same body.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let (storage, profiles) = tokio::join!(
        DependencyCheck::probe("storage", state.storage.check_connectivity()),
        DependencyCheck::probe("profiles", state.profiles.check_connectivity()),
    );

    let ready = storage.is_ok() && profiles.is_ok();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            status: if ready { "ready" } else { "degraded" },
            storage,
            profiles,
        }),
    )
}
