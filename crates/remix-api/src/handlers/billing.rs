//! Checkout and billing portal handlers.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{required_field, JsonBody};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::services::stripe::CheckoutSession;
use crate::state::AppState;

/// Billing routes act on the authenticated user only.
///
/// A `userId` in the body is accepted for older clients but must match.
fn ensure_same_user(user: &AuthUser, claimed: Option<&str>) -> ApiResult<()> {
    match claimed.map(str::trim).filter(|c| !c.is_empty()) {
        Some(claimed) if claimed != user.user_id => {
            warn!(user_id = %user.user_id, claimed, "Billing request for another user");
            Err(ApiError::forbidden("userId does not match the session"))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<CheckoutSession> for CheckoutResponse {
    fn from(session: CheckoutSession) -> Self {
        Self {
            session_id: session.id,
            url: session.url,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub user_id: Option<String>,
    pub price_id: Option<String>,
}

/// Subscription checkout for a catalog price.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<CheckoutRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    ensure_same_user(&user, request.user_id.as_deref())?;
    let price_id = required_field("priceId", request.price_id)?;

    let session = state
        .billing
        .create_checkout_session(&user.user_id, &price_id)
        .await?;
    info!(user_id = %user.user_id, price_id = %price_id, session_id = %session.id, "Checkout session created");
    Ok(Json(session.into()))
}

/// Body is optional; an absent or unreadable one scopes to the session user.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserScopedRequest {
    pub user_id: Option<String>,
}

/// One-time credit top-up. Paid tiers only.
pub async fn create_top_up_checkout_session(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<JsonBody<UserScopedRequest>>,
) -> ApiResult<Json<CheckoutResponse>> {
    let request = body.map(|JsonBody(r)| r).unwrap_or_default();
    ensure_same_user(&user, request.user_id.as_deref())?;

    let session = state.billing.create_top_up_session(&user.user_id).await?;
    info!(user_id = %user.user_id, session_id = %session.id, "Top-up session created");
    Ok(Json(session.into()))
}

#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub url: String,
}

/// Billing portal for an existing customer.
pub async fn create_portal_session(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<JsonBody<UserScopedRequest>>,
) -> ApiResult<Json<PortalResponse>> {
    let request = body.map(|JsonBody(r)| r).unwrap_or_default();
    ensure_same_user(&user, request.user_id.as_deref())?;

    let url = state.billing.create_portal_session(&user.user_id).await?;
    Ok(Json(PortalResponse { url }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_must_match_session() {
        let user = AuthUser {
            user_id: "user_1".into(),
            session_id: None,
        };
        assert!(ensure_same_user(&user, None).is_ok());
        assert!(ensure_same_user(&user, Some("")).is_ok());
        assert!(ensure_same_user(&user, Some("user_1")).is_ok());
        assert!(matches!(
            ensure_same_user(&user, Some("user_2")),
            Err(ApiError::Forbidden(_))
        ));
    }
}
