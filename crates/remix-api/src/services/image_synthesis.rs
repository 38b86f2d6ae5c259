//! Style descriptor + topic → one synthesized image.

use std::sync::Arc;

use remix_gemini::{ContentModel, ContentRequest, GeminiError, ImageModel};
use remix_models::StyleInfluence;
use tracing::{info, warn};

use super::content::render;
use super::error::{PipelineError, PipelineResult};
use super::prompts::IMAGE_PROMPT;

/// Two chained calls: a text model writes the image prompt, then the image
/// model renders it.
#[derive(Clone)]
pub struct ImageSynthesizer {
    text: Arc<dyn ContentModel>,
    images: Arc<dyn ImageModel>,
}

impl ImageSynthesizer {
    pub fn new(text: Arc<dyn ContentModel>, images: Arc<dyn ImageModel>) -> Self {
        Self { text, images }
    }

    /// Returns a `data:` URL.
    pub async fn synthesize(
        &self,
        style: &str,
        topic: &str,
        details: &str,
        influence: StyleInfluence,
    ) -> PipelineResult<String> {
        let influence_text = format!("{}/100. {}", influence.value(), influence.instruction());
        let request = render(
            IMAGE_PROMPT,
            &[("topic", topic), ("details", details)],
            &[("style", style), ("influence", influence_text.as_str())],
        )?;

        let composed = self.text.generate(ContentRequest::text(request)).await?;
        let composed = composed.trim();
        if composed.is_empty() {
            return Err(PipelineError::generation_malformed("model returned an empty image prompt"));
        }

        match self.images.generate_image(composed).await {
            Ok(image) => {
                info!(
                    mime_type = %image.mime_type,
                    encoded_len = image.base64_data.len(),
                    "Image synthesized"
                );
                Ok(image.data_url())
            }
            Err(GeminiError::NoImage { raw }) => {
                // Logged for diagnosis only; the client gets the generic message.
                warn!(prompt = %composed, response = %raw, "Image model returned no image");
                Err(PipelineError::ImageSynthesisFailed(
                    "the image model returned no image".to_string(),
                ))
            }
            Err(GeminiError::Blocked(reason)) => {
                warn!(prompt = %composed, reason = %reason, "Image prompt was blocked");
                Err(PipelineError::ImageSynthesisFailed(format!("blocked: {}", reason)))
            }
            Err(e) => Err(e.into()),
        }
    }
}
