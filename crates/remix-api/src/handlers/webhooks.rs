//! Identity and payment provider webhooks.
//!
//! Bodies are taken as raw bytes: signatures cover the exact payload, so
//! nothing may parse or re-serialize it before verification.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ApiResult;
use crate::metrics::record_webhook_event;
use crate::services::reconciler::{SOURCE_CLERK, SOURCE_STRIPE};
use crate::services::signatures::{verify_stripe, verify_svix, SvixHeaders};
use crate::state::AppState;

const SVIX_ID: &str = "svix-id";
const SVIX_TIMESTAMP: &str = "svix-timestamp";
const SVIX_SIGNATURE: &str = "svix-signature";
const STRIPE_SIGNATURE: &str = "stripe-signature";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[derive(Debug, Serialize)]
pub struct WebhookMessage {
    pub message: String,
}

/// Clerk (Svix-signed) events.
pub async fn clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookMessage>> {
    let svix = SvixHeaders {
        id: header(&headers, SVIX_ID),
        timestamp: header(&headers, SVIX_TIMESTAMP),
        signature: header(&headers, SVIX_SIGNATURE),
    };

    if let Err(e) = verify_svix(&state.identity_webhook_secret, svix, &body) {
        warn!(error = %e, "Rejected identity webhook");
        record_webhook_event(SOURCE_CLERK, "unknown", "invalid_signature");
        return Err(e.into());
    }

    // Verified above, so the id header is present.
    let message_id = svix.id.unwrap_or_default();
    let outcome = state.reconciler.handle_identity(message_id, &body).await?;

    info!(message_id, outcome = outcome.as_str(), "Identity webhook processed");
    Ok(Json(WebhookMessage {
        message: format!("Webhook {}", outcome.as_str()),
    }))
}

#[derive(Debug, Serialize)]
pub struct WebhookReceipt {
    pub received: bool,
}

/// Stripe events.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookReceipt>> {
    if let Err(e) = verify_stripe(
        &state.billing_webhook_secret,
        header(&headers, STRIPE_SIGNATURE),
        &body,
    ) {
        warn!(error = %e, "Rejected Stripe webhook");
        record_webhook_event(SOURCE_STRIPE, "unknown", "invalid_signature");
        return Err(e.into());
    }

    let outcome = state.reconciler.handle_stripe(&body).await?;
    info!(outcome = outcome.as_str(), "Stripe webhook processed");
    Ok(Json(WebhookReceipt { received: true }))
}
