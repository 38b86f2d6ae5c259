//! Image analysis and image-content handlers.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use remix_models::{AnalysisBlueprint, ImageContent, StyleInfluence};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::ingest::{multipart_error, FILE_FIELD};
use super::video::AnalyzeResponse;
use super::JsonBody;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::security::{optional_text, require_text, MAX_DETAILS_LENGTH, MAX_TOPIC_LENGTH};
use crate::services::ImageContentOptions;
use crate::state::AppState;

/// Image phase 1 from a multipart `file` field.
pub async fn analyze_image(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let mut multipart = multipart.map_err(multipart_error)?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let mime_type = field
            .content_type()
            .map(str::to_string)
            .ok_or_else(|| ApiError::validation("file part must declare a content type"))?;
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let analysis = state.content.analyze_image(bytes.to_vec(), &mime_type).await?;
        info!(user_id = %user.user_id, mime_type = %mime_type, "Image analysis delivered");
        return Ok(Json(AnalyzeResponse { analysis }));
    }

    Err(ApiError::validation("file is required"))
}

// ============================================================================
// Image content request parsing
// ============================================================================

/// Raw fields as sent by either encoding. Multipart values arrive as strings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContentFields {
    pub analysis: Option<Value>,
    pub topic: Option<String>,
    pub details: Option<String>,
    pub style_influence: Option<Value>,
    #[serde(alias = "includeText")]
    pub include_headline: Option<Value>,
}

impl ImageContentFields {
    fn set_text(&mut self, name: &str, value: String) {
        match name {
            "analysis" => self.analysis = Some(Value::String(value)),
            "topic" => self.topic = Some(value),
            "details" => self.details = Some(value),
            "styleInfluence" => self.style_influence = Some(Value::String(value)),
            "includeHeadline" | "includeText" => self.include_headline = Some(Value::String(value)),
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }

    /// Validate every field, failing on the first deviation.
    pub fn into_request(self) -> ApiResult<ImageContentRequest> {
        let analysis = self
            .analysis
            .filter(|v| !v.is_null())
            .ok_or_else(|| ApiError::validation("analysis is required"))?;
        let blueprint = AnalysisBlueprint::from_client_value(analysis)
            .map_err(|e| ApiError::validation(e.to_string()))?;

        let topic = require_text("topic", self.topic.as_deref(), MAX_TOPIC_LENGTH)
            .map_err(ApiError::validation)?;
        let details = optional_text("details", self.details.as_deref(), MAX_DETAILS_LENGTH)
            .map_err(ApiError::validation)?;

        let style_influence = match self.style_influence {
            None | Some(Value::Null) => StyleInfluence::default(),
            Some(Value::String(s)) if s.trim().is_empty() => StyleInfluence::default(),
            Some(Value::String(s)) => s.parse().map_err(ApiError::validation)?,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(f) if f.is_finite() => {
                    StyleInfluence::new(f.round() as i64).map_err(ApiError::validation)?
                }
                _ => return Err(ApiError::validation("styleInfluence must be a number")),
            },
            Some(_) => return Err(ApiError::validation("styleInfluence must be a number")),
        };

        let include_headline = match self.include_headline {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => parse_flag(&s)?,
            Some(_) => return Err(ApiError::validation("includeHeadline must be a boolean")),
        };

        Ok(ImageContentRequest {
            blueprint,
            options: ImageContentOptions {
                topic,
                details,
                style_influence,
                include_headline,
            },
        })
    }
}

fn parse_flag(raw: &str) -> ApiResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" | "" => Ok(false),
        other => Err(ApiError::validation(format!(
            "includeHeadline must be a boolean, got '{}'",
            other
        ))),
    }
}

/// Typed image-content request.
#[derive(Debug, Clone)]
pub struct ImageContentRequest {
    pub blueprint: AnalysisBlueprint,
    pub options: ImageContentOptions,
}

#[axum::async_trait]
impl<S> FromRequest<S> for ImageContentRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        let fields = if is_multipart {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(multipart_error)?;
            let mut fields = ImageContentFields::default();
            while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                let value = field.text().await.map_err(multipart_error)?;
                fields.set_text(&name, value);
            }
            fields
        } else {
            let JsonBody(fields) = JsonBody::<ImageContentFields>::from_request(req, state).await?;
            fields
        };

        fields.into_request()
    }
}

#[derive(Debug, Serialize)]
pub struct ImageContentResponse {
    pub result: ImageContent,
}

/// Image phase 2: posts, optional headline and a synthesized image.
pub async fn generate_image_content(
    State(state): State<AppState>,
    user: AuthUser,
    request: ImageContentRequest,
) -> ApiResult<Json<ImageContentResponse>> {
    let result = state
        .content
        .generate_image_content(&request.blueprint, &request.options)
        .await?;

    info!(user_id = %user.user_id, headline = result.headline.is_some(), "Image content delivered");
    Ok(Json(ImageContentResponse { result }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn analysis() -> Value {
        json!({"subjects": ["chef"], "setting": "kitchen", "style_elements": {"palette": "warm"}})
    }

    #[test]
    fn test_json_fields_parse() {
        let fields: ImageContentFields = serde_json::from_value(json!({
            "analysis": analysis(),
            "topic": "cooking pasta",
            "styleInfluence": 80,
            "includeHeadline": true
        }))
        .unwrap();
        let request = fields.into_request().unwrap();
        assert_eq!(request.options.topic, "cooking pasta");
        assert_eq!(request.options.style_influence.value(), 80);
        assert!(request.options.include_headline);
        assert_eq!(request.options.details, None);
    }

    #[test]
    fn test_form_fields_parse_from_strings() {
        let mut fields = ImageContentFields::default();
        fields.set_text("analysis", analysis().to_string());
        fields.set_text("topic", "cooking pasta".into());
        fields.set_text("styleInfluence", "42.6".into());
        fields.set_text("includeText", "on".into());
        fields.set_text("image", "ignored".into());

        let request = fields.into_request().unwrap();
        assert_eq!(request.options.style_influence.value(), 43);
        assert!(request.options.include_headline);
    }

    #[test]
    fn test_rejects_bad_fields() {
        let base = || ImageContentFields {
            analysis: Some(analysis()),
            topic: Some("pasta".into()),
            ..Default::default()
        };

        assert!(ImageContentFields { analysis: None, ..base() }.into_request().is_err());
        assert!(ImageContentFields { topic: Some(" ".into()), ..base() }.into_request().is_err());
        assert!(ImageContentFields {
            style_influence: Some(json!(101)),
            ..base()
        }
        .into_request()
        .is_err());
        assert!(ImageContentFields {
            include_headline: Some(json!("maybe")),
            ..base()
        }
        .into_request()
        .is_err());
    }
}
