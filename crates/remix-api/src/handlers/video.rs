//! Video analysis and generation handlers.

use axum::extract::State;
use axum::Json;
use remix_models::{
    extract_youtube_id, AnalysisBlueprint, GeneratedContent, MediaReference, OutputDetail,
    OutputType, VideoGenerationResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{required_field, JsonBody};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::security::{require_text, validate_media_url, MAX_TOPIC_LENGTH};
use crate::services::GenerationOptions;
use crate::state::AppState;

// ============================================================================
// Request parsing
// ============================================================================

fn media_reference(video_source: Option<String>, mime_type: Option<String>) -> ApiResult<MediaReference> {
    let source = required_field("videoSource", video_source)?;
    let mime_type = required_field("mimeType", mime_type)?;

    validate_media_url(&source)
        .into_result()
        .map_err(ApiError::validation)?;
    MediaReference::new(source, mime_type).map_err(ApiError::validation)
}

fn output_type(raw: Option<String>) -> ApiResult<OutputType> {
    required_field("outputType", raw)?
        .parse()
        .map_err(ApiError::validation)
}

fn output_detail(raw: Option<String>) -> ApiResult<Option<OutputDetail>> {
    match raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => serde_json::from_value(Value::String(s.clone()))
            .map(Some)
            .map_err(|_| {
                ApiError::validation(format!(
                    "outputDetail must be 'Short Form' or 'Long Form', got '{}'",
                    s
                ))
            }),
    }
}

fn generation_options(
    topic: Option<String>,
    output_type_raw: Option<String>,
    output_detail_raw: Option<String>,
) -> ApiResult<GenerationOptions> {
    Ok(GenerationOptions {
        topic: require_text("topic", topic.as_deref(), MAX_TOPIC_LENGTH).map_err(ApiError::validation)?,
        output_type: output_type(output_type_raw)?,
        output_detail: output_detail(output_detail_raw)?,
    })
}

// ============================================================================
// Duration lookup
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDurationRequest {
    pub video_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VideoDurationResponse {
    /// Length in seconds.
    pub duration: u64,
}

/// Duration of a YouTube video. Other platforms are rejected.
pub async fn get_video_duration(
    State(state): State<AppState>,
    _user: AuthUser,
    JsonBody(request): JsonBody<VideoDurationRequest>,
) -> ApiResult<Json<VideoDurationResponse>> {
    let video_url = required_field("videoUrl", request.video_url)?;
    let video_id = extract_youtube_id(&video_url)
        .map_err(|e| ApiError::validation(format!("Invalid YouTube URL: {}", e)))?;

    let duration = state.videos.duration_secs(&video_id).await?;
    Ok(Json(VideoDurationResponse { duration }))
}

// ============================================================================
// Analyze + generate
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub topic: Option<String>,
    pub output_detail: Option<String>,
    pub output_type: Option<String>,
    pub video_source: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub result: VideoGenerationResult,
}

/// Both phases in one request.
pub async fn generate(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let media = media_reference(request.video_source, request.mime_type)?;
    let options = generation_options(request.topic, request.output_type, request.output_detail)?;

    let result = state.content.run(&media, &options).await?;
    info!(user_id = %user.user_id, output_type = %options.output_type, "Generation delivered");
    Ok(Json(GenerateResponse { result }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub video_source: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis: AnalysisBlueprint,
}

/// Phase 1 only.
pub async fn analyze(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<AnalyzeRequest>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let media = media_reference(request.video_source, request.mime_type)?;

    let analysis = state.content.analyze_video(&media).await?;
    info!(user_id = %user.user_id, "Analysis delivered");
    Ok(Json(AnalyzeResponse { analysis }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub topic: Option<String>,
    pub output_type: Option<String>,
    pub output_detail: Option<String>,
    pub analysis: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct GenerateContentResponse {
    pub content: GeneratedContent,
}

/// Phase 2 with the blueprint resent by the client.
pub async fn generate_content(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<GenerateContentRequest>,
) -> ApiResult<Json<GenerateContentResponse>> {
    let analysis = request
        .analysis
        .ok_or_else(|| ApiError::validation("analysis is required"))?;
    let blueprint =
        AnalysisBlueprint::from_client_value(analysis).map_err(|e| ApiError::validation(e.to_string()))?;
    let options = generation_options(request.topic, request.output_type, request.output_detail)?;

    let content = state.content.generate_content(&blueprint, &options).await?;
    info!(user_id = %user.user_id, output_type = %options.output_type, "Content delivered");
    Ok(Json(GenerateContentResponse { content }))
}
