//! Profile and credit handlers.

use axum::extract::State;
use axum::Json;
use remix_models::UserProfile;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// Caller's profile row.
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<UserProfile>> {
    let profile = state.ledger.profile(&user.user_id).await?;
    Ok(Json(profile))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditBalanceResponse {
    pub credit_balance: i64,
}

/// Consume one credit for the caller. 402 when the balance is exhausted.
pub async fn decrement_credits(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<CreditBalanceResponse>> {
    let credit_balance = state.ledger.decrement(&user.user_id).await?;
    Ok(Json(CreditBalanceResponse { credit_balance }))
}
