//! Analyze → generate content pipeline.
//!
//! Phase 1 turns a media reference (video) or inline bytes (image) into an
//! [`AnalysisBlueprint`]. Phase 2 renders the blueprint and a topic into a
//! second prompt. Runs move linearly through [`PipelineStage`]; nothing is
//! retried automatically.

use std::sync::Arc;

use remix_gemini::{response_schema, ContentModel, ContentRequest, InputPart};
use remix_models::{
    AnalysisBlueprint, BlueprintKind, GeneratedContent, ImageContent, MediaReference,
    OutputDetail, OutputType, SocialPosts, StyleInfluence, VideoGenerationResult,
    DEFAULT_SCENE_RANGE,
};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{PipelineError, PipelineResult};
use super::image_synthesis::ImageSynthesizer;
use super::prompts::{
    PromptTemplate, TemplateError, HEADLINE, IMAGE_ANALYSIS, SCRIPT, SOCIAL_POSTS, STORYBOARD,
    STYLE_DESCRIPTOR, VIDEO_ANALYSIS,
};
use crate::metrics::record_stage;

// ============================================================================
// Stage tracking
// ============================================================================

/// Linear pipeline stages. `Failed` is reachable from the two active stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Analyzing,
    Analyzed,
    Generating,
    Complete,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Analyzing => "analyzing",
            PipelineStage::Analyzed => "analyzed",
            PipelineStage::Generating => "generating",
            PipelineStage::Complete => "complete",
            PipelineStage::Failed => "failed",
        }
    }

    fn can_advance_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        matches!(
            (self, next),
            (Idle, Analyzing)
                | (Analyzing, Analyzed)
                | (Analyzed, Generating)
                | (Generating, Complete)
                | (Analyzing, Failed)
                | (Generating, Failed)
        )
    }
}

/// One pipeline invocation.
#[derive(Debug)]
pub struct PipelineRun {
    id: Uuid,
    pipeline: &'static str,
    stage: PipelineStage,
}

impl PipelineRun {
    /// A fresh run that will start with analysis.
    pub fn new(pipeline: &'static str) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline,
            stage: PipelineStage::Idle,
        }
    }

    /// A generate-only run whose blueprint came from the client.
    pub fn from_blueprint(pipeline: &'static str) -> Self {
        Self {
            stage: PipelineStage::Analyzed,
            ..Self::new(pipeline)
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn advance(&mut self, next: PipelineStage) -> PipelineResult<()> {
        if !self.stage.can_advance_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        debug!(
            run_id = %self.id,
            pipeline = self.pipeline,
            from = self.stage.as_str(),
            to = next.as_str(),
            "Pipeline transition"
        );
        self.stage = next;
        Ok(())
    }

    /// Run `phase` inside `active`, landing on `done` or `Failed`.
    async fn phase<T, F>(
        &mut self,
        active: PipelineStage,
        done: PipelineStage,
        phase: F,
    ) -> PipelineResult<T>
    where
        F: std::future::Future<Output = PipelineResult<T>>,
    {
        self.advance(active)?;
        match phase.await {
            Ok(value) => {
                record_stage(self.pipeline, active.as_str(), "ok");
                self.advance(done)?;
                Ok(value)
            }
            Err(e) => {
                record_stage(self.pipeline, active.as_str(), e.kind());
                warn!(
                    run_id = %self.id,
                    pipeline = self.pipeline,
                    stage = active.as_str(),
                    error = %e,
                    "Pipeline phase failed"
                );
                self.advance(PipelineStage::Failed)?;
                Err(e)
            }
        }
    }
}

// ============================================================================
// Output cleanup
// ============================================================================

/// Remove a surrounding markdown code fence (```json ... ```), if present.
///
/// Idempotent: unfenced text is only trimmed.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parse the span from the first `[` to the last `]` as a JSON array.
///
/// Text outside the span is ignored. No bracket pair yields an empty array.
pub fn extract_json_array(text: &str) -> Result<Vec<Value>, serde_json::Error> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        return Ok(Vec::new());
    };
    if end < start {
        return Ok(Vec::new());
    }
    serde_json::from_str(&text[start..=end])
}

/// Render a prompt. `caller` values come from the request, `derived` values
/// from the model or the server.
pub(super) fn render(
    template: PromptTemplate,
    caller: &[(&str, &str)],
    derived: &[(&str, &str)],
) -> PipelineResult<String> {
    template.render_with(caller, derived).map_err(|e| match e {
        TemplateError::ReservedSequence { name } => {
            PipelineError::validation(format!("{} must not contain '{{{{' or '}}}}'", name))
        }
        other => PipelineError::Upstream(other.to_string()),
    })
}

// ============================================================================
// Pipeline
// ============================================================================

/// Options for phase 2 of the video flow.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub topic: String,
    pub output_type: OutputType,
    pub output_detail: Option<OutputDetail>,
}

/// Options for phase 2 of the image flow.
#[derive(Debug, Clone, Default)]
pub struct ImageContentOptions {
    pub topic: String,
    pub details: Option<String>,
    pub style_influence: StyleInfluence,
    pub include_headline: bool,
}

/// Two-phase content generation over a [`ContentModel`].
#[derive(Clone)]
pub struct ContentPipeline {
    model: Arc<dyn ContentModel>,
    images: ImageSynthesizer,
}

impl ContentPipeline {
    pub fn new(model: Arc<dyn ContentModel>, images: ImageSynthesizer) -> Self {
        Self { model, images }
    }

    // ------------------------------------------------------------------------
    // Phase 1
    // ------------------------------------------------------------------------

    async fn analyze_video_inner(&self, media: &MediaReference) -> PipelineResult<AnalysisBlueprint> {
        let prompt = render(VIDEO_ANALYSIS, &[], &[])?;
        let request = ContentRequest::text(prompt)
            .with_part(InputPart::file(&media.mime_type, &media.uri))
            .json();

        let raw = self.model.generate(request).await?;
        AnalysisBlueprint::parse_model_output(BlueprintKind::Video, strip_code_fences(&raw))
            .map_err(PipelineError::analysis_malformed)
    }

    /// Phase 1 for a video.
    pub async fn analyze_video(&self, media: &MediaReference) -> PipelineResult<AnalysisBlueprint> {
        let mut run = PipelineRun::new("video");
        let blueprint = run
            .phase(
                PipelineStage::Analyzing,
                PipelineStage::Analyzed,
                self.analyze_video_inner(media),
            )
            .await?;
        info!(run_id = %run.id(), mime_type = %media.mime_type, "Video analyzed");
        Ok(blueprint)
    }

    /// Phase 1 for an image sent inline.
    pub async fn analyze_image(&self, bytes: Vec<u8>, mime_type: &str) -> PipelineResult<AnalysisBlueprint> {
        if bytes.is_empty() {
            return Err(PipelineError::validation("image file is empty"));
        }
        if !mime_type.starts_with("image/") {
            return Err(PipelineError::validation(format!(
                "expected an image, got '{}'",
                mime_type
            )));
        }

        let mut run = PipelineRun::new("image");
        let fut = async {
            let prompt = render(IMAGE_ANALYSIS, &[], &[])?;
            let request = ContentRequest::text(prompt)
                .with_part(InputPart::inline(mime_type, bytes))
                .json();
            let raw = self.model.generate(request).await?;
            AnalysisBlueprint::parse_model_output(BlueprintKind::Image, strip_code_fences(&raw))
                .map_err(PipelineError::analysis_malformed)
        };
        let blueprint = run
            .phase(PipelineStage::Analyzing, PipelineStage::Analyzed, fut)
            .await?;
        info!(run_id = %run.id(), "Image analyzed");
        Ok(blueprint)
    }

    // ------------------------------------------------------------------------
    // Phase 2
    // ------------------------------------------------------------------------

    async fn generate_inner(
        &self,
        blueprint: &AnalysisBlueprint,
        options: &GenerationOptions,
    ) -> PipelineResult<GeneratedContent> {
        let blueprint_json = blueprint.to_prompt_json();
        let topic = options.topic.as_str();

        match options.output_type {
            OutputType::Script => {
                let detail = options
                    .output_detail
                    .unwrap_or(OutputDetail::ShortForm)
                    .as_str()
                    .to_lowercase();
                let prompt = render(
                    SCRIPT,
                    &[("topic", topic)],
                    &[
                        ("output_detail", detail.as_str()),
                        ("blueprint", blueprint_json.as_str()),
                    ],
                )?;
                let script = self.model.generate(ContentRequest::text(prompt)).await?;
                let script = strip_code_fences(&script).to_string();
                if script.is_empty() {
                    return Err(PipelineError::generation_malformed("model returned an empty script"));
                }
                Ok(GeneratedContent::Script(script))
            }
            OutputType::ScenePrompts => {
                let (min, max) = options
                    .output_detail
                    .map(|d| d.scene_range())
                    .unwrap_or(DEFAULT_SCENE_RANGE);
                let (min_s, max_s) = (min.to_string(), max.to_string());
                let prompt = render(
                    STORYBOARD,
                    &[("topic", topic)],
                    &[
                        ("blueprint", blueprint_json.as_str()),
                        ("min_scenes", min_s.as_str()),
                        ("max_scenes", max_s.as_str()),
                    ],
                )?;
                let raw = self.model.generate(ContentRequest::text(prompt)).await?;
                let scenes = scenes_from_output(&raw)?;
                if !(min..=max).contains(&scenes.len()) {
                    warn!(
                        scenes = scenes.len(),
                        min, max, "Scene count outside the requested range"
                    );
                }
                Ok(GeneratedContent::ScenePrompts(scenes))
            }
        }
    }

    /// Phase 2 with a blueprint resent by the client.
    pub async fn generate_content(
        &self,
        blueprint: &AnalysisBlueprint,
        options: &GenerationOptions,
    ) -> PipelineResult<GeneratedContent> {
        let mut run = PipelineRun::from_blueprint("video");
        let content = run
            .phase(
                PipelineStage::Generating,
                PipelineStage::Complete,
                self.generate_inner(blueprint, options),
            )
            .await?;
        info!(run_id = %run.id(), output_type = %options.output_type, "Content generated");
        Ok(content)
    }

    /// Both phases in one call.
    pub async fn run(
        &self,
        media: &MediaReference,
        options: &GenerationOptions,
    ) -> PipelineResult<VideoGenerationResult> {
        let mut run = PipelineRun::new("video");
        let analysis = run
            .phase(
                PipelineStage::Analyzing,
                PipelineStage::Analyzed,
                self.analyze_video_inner(media),
            )
            .await?;
        let content = run
            .phase(
                PipelineStage::Generating,
                PipelineStage::Complete,
                self.generate_inner(&analysis, options),
            )
            .await?;

        info!(
            run_id = %run.id(),
            output_type = %options.output_type,
            "Analyze and generate complete"
        );
        Ok(VideoGenerationResult { analysis, content })
    }

    // ------------------------------------------------------------------------
    // Image flow phase 2
    // ------------------------------------------------------------------------

    async fn social_posts(&self, blueprint_json: &str, topic: &str, details: &str) -> PipelineResult<SocialPosts> {
        let prompt = render(
            SOCIAL_POSTS,
            &[("topic", topic), ("details", details)],
            &[("blueprint", blueprint_json)],
        )?;
        let request = ContentRequest::text(prompt).json_schema(response_schema::<SocialPosts>());
        let raw = self.model.generate(request).await?;

        let posts: SocialPosts = serde_json::from_str(strip_code_fences(&raw))
            .map_err(|e| PipelineError::generation_malformed(format!("social posts: {}", e)))?;
        if let Some(platform) = posts.first_blank() {
            return Err(PipelineError::generation_malformed(format!(
                "{} post is empty",
                platform.display_name()
            )));
        }
        Ok(posts)
    }

    async fn headline(&self, topic: &str, details: &str) -> PipelineResult<String> {
        let prompt = render(HEADLINE, &[("topic", topic), ("details", details)], &[])?;
        let raw = self.model.generate(ContentRequest::text(prompt)).await?;
        let headline = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string();
        if headline.is_empty() {
            return Err(PipelineError::generation_malformed("model returned an empty headline"));
        }
        Ok(headline)
    }

    async fn style_then_image(
        &self,
        blueprint_json: &str,
        options: &ImageContentOptions,
        details: &str,
    ) -> PipelineResult<String> {
        let prompt = render(STYLE_DESCRIPTOR, &[], &[("blueprint", blueprint_json)])?;
        let style = self.model.generate(ContentRequest::text(prompt)).await?;
        let style = style.trim();
        if style.is_empty() {
            return Err(PipelineError::generation_malformed("model returned an empty style description"));
        }
        self.images
            .synthesize(style, &options.topic, details, options.style_influence)
            .await
    }

    /// Posts, optional headline and image, generated concurrently.
    ///
    /// The image branch waits on its own style description only.
    pub async fn generate_image_content(
        &self,
        blueprint: &AnalysisBlueprint,
        options: &ImageContentOptions,
    ) -> PipelineResult<ImageContent> {
        let mut run = PipelineRun::from_blueprint("image");
        let blueprint_json = blueprint.to_prompt_json();
        let details = options.details.as_deref().unwrap_or("none");

        let fut = async {
            let headline_branch = async {
                if options.include_headline {
                    self.headline(&options.topic, details).await.map(Some)
                } else {
                    Ok(None)
                }
            };

            let (posts, headline, image_url) = tokio::try_join!(
                self.social_posts(&blueprint_json, &options.topic, details),
                headline_branch,
                self.style_then_image(&blueprint_json, options, details),
            )?;

            Ok::<_, PipelineError>(ImageContent {
                image_url,
                posts,
                headline,
            })
        };

        let content = run
            .phase(PipelineStage::Generating, PipelineStage::Complete, fut)
            .await?;
        info!(
            run_id = %run.id(),
            headline = content.headline.is_some(),
            "Image content generated"
        );
        Ok(content)
    }
}

/// Scene prompts from storyboard output. An empty result is malformed.
fn scenes_from_output(raw: &str) -> PipelineResult<Vec<String>> {
    let values = extract_json_array(raw)
        .map_err(|e| PipelineError::generation_malformed(format!("scene array: {}", e)))?;
    if values.is_empty() {
        return Err(PipelineError::generation_malformed("model returned no scene prompts"));
    }

    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| match value {
            Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            _ => Err(PipelineError::generation_malformed(format!(
                "scene {} is not a non-empty string",
                i + 1
            ))),
        })
        .collect()
}
