//! Signed upload URL handler.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{required_field, JsonBody};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSignedUrlRequest {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSignedUrlResponse {
    pub signed_url: String,
    /// Object key to send back to `/api/transfer-to-gemini`.
    pub path: String,
    pub token: String,
}

/// Issue a short-lived signed upload URL for a staged upload.
pub async fn create_signed_url(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<CreateSignedUrlRequest>,
) -> ApiResult<Json<CreateSignedUrlResponse>> {
    let file_name = required_field("fileName", request.file_name)?;
    let content_type = required_field("contentType", request.content_type)?;

    let upload = state
        .storage
        .issue_upload_url(&file_name, &content_type)
        .await?;

    info!(user_id = %user.user_id, path = %upload.path, "Issued signed upload URL");

    Ok(Json(CreateSignedUrlResponse {
        signed_url: upload.signed_url,
        path: upload.path,
        token: upload.token,
    }))
}
