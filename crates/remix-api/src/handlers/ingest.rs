//! Media ingestion handlers.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use futures_util::StreamExt;
use remix_models::MediaReference;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{required_field, JsonBody};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::services::ingestion::stream_error;
use crate::state::AppState;

/// Multipart field carrying the media bytes.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub file_path: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub file_uri: String,
    pub mime_type: String,
}

impl From<MediaReference> for IngestResponse {
    fn from(media: MediaReference) -> Self {
        Self {
            file_uri: media.uri,
            mime_type: media.mime_type,
        }
    }
}

/// Move a staged bucket object into the model file store.
pub async fn transfer_to_gemini(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<TransferRequest>,
) -> ApiResult<Json<IngestResponse>> {
    let file_path = required_field("filePath", request.file_path)?;
    let mime_type = required_field("mimeType", request.mime_type)?;

    let media = state
        .ingestion
        .transfer_from_storage(&file_path, &mime_type)
        .await?;

    info!(user_id = %user.user_id, uri = %media.uri, "Staged upload transferred");
    Ok(Json(media.into()))
}

pub(crate) fn multipart_error(e: impl std::fmt::Display) -> ApiError {
    ApiError::validation(format!("Invalid multipart body: {}", e))
}

/// Stream a multipart `file` field straight into the model file store.
pub async fn upload_video(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<IngestResponse>> {
    let mut multipart = multipart.map_err(multipart_error)?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let mime_type = field
            .content_type()
            .map(str::to_string)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ApiError::validation("file part must declare a content type"))?;
        let display_name = field.file_name().unwrap_or("upload").to_string();

        let body = field.map(|chunk| chunk.map_err(stream_error("upload interrupted")));
        let media = state
            .ingestion
            .ingest_stream(body, &mime_type, &display_name)
            .await?;

        info!(user_id = %user.user_id, uri = %media.uri, "Direct upload ingested");
        return Ok(Json(media.into()));
    }

    Err(ApiError::validation("file is required"))
}
