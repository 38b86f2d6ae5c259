//! Prompt templates with validated named parameters.
//!
//! Templates use `{{name}}` placeholders. Rendering checks the parameter set
//! against the placeholders before substituting anything, and substitutes in
//! a single pass so supplied values are never re-scanned.

use std::collections::BTreeSet;

use thiserror::Error;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template '{template}' is missing parameter '{name}'")]
    MissingParam { template: &'static str, name: String },

    #[error("template '{template}' has no parameter '{name}'")]
    UnknownParam { template: &'static str, name: String },

    #[error("value for '{name}' contains a reserved '{{{{' or '}}}}' sequence")]
    ReservedSequence { name: String },

    #[error("template '{template}' is malformed: {message}")]
    Malformed { template: &'static str, message: String },
}

/// A static prompt with `{{name}}` placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    name: &'static str,
    source: &'static str,
}

enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

impl PromptTemplate {
    pub const fn new(name: &'static str, source: &'static str) -> Self {
        Self { name, source }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn segments(&self) -> Result<Vec<Segment<'static>>, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = self.source;

        while let Some(start) = rest.find(OPEN) {
            segments.push(Segment::Literal(&rest[..start]));
            let after = &rest[start + OPEN.len()..];
            let end = after.find(CLOSE).ok_or_else(|| TemplateError::Malformed {
                template: self.name,
                message: "unterminated placeholder".to_string(),
            })?;
            let name = after[..end].trim();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(TemplateError::Malformed {
                    template: self.name,
                    message: format!("invalid placeholder name '{}'", name),
                });
            }
            segments.push(Segment::Placeholder(name));
            rest = &after[end + CLOSE.len()..];
        }
        if rest.contains(CLOSE) {
            return Err(TemplateError::Malformed {
                template: self.name,
                message: "stray closing delimiter".to_string(),
            });
        }
        segments.push(Segment::Literal(rest));

        Ok(segments)
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Result<Vec<&'static str>, TemplateError> {
        let mut seen = BTreeSet::new();
        Ok(self
            .segments()?
            .into_iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) if seen.insert(name) => Some(name),
                _ => None,
            })
            .collect())
    }

    /// Render with exactly the parameters the template declares, all of them
    /// caller-supplied.
    pub fn render(&self, params: &[(&str, &str)]) -> Result<String, TemplateError> {
        self.render_with(params, &[])
    }

    /// Render with caller-supplied `params` and server-derived `derived`
    /// values (model output, computed numbers).
    ///
    /// Only caller values are refused when they contain a delimiter; derived
    /// values are substituted verbatim. Neither is re-scanned.
    pub fn render_with(
        &self,
        params: &[(&str, &str)],
        derived: &[(&str, &str)],
    ) -> Result<String, TemplateError> {
        let segments = self.segments()?;
        let declared = self.placeholders()?;

        for (name, value) in params {
            if value.contains(OPEN) || value.contains(CLOSE) {
                return Err(TemplateError::ReservedSequence {
                    name: name.to_string(),
                });
            }
        }
        let supplied: Vec<(&str, &str)> = params.iter().chain(derived).copied().collect();
        for (name, _) in &supplied {
            if !declared.iter().any(|d| d == name) {
                return Err(TemplateError::UnknownParam {
                    template: self.name,
                    name: name.to_string(),
                });
            }
        }
        for name in &declared {
            if !supplied.iter().any(|(n, _)| n == name) {
                return Err(TemplateError::MissingParam {
                    template: self.name,
                    name: name.to_string(),
                });
            }
        }

        let mut out = String::with_capacity(self.source.len());
        for segment in segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = supplied
                        .iter()
                        .find(|(n, _)| *n == name)
                        .map(|(_, v)| *v)
                        .unwrap_or_default();
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

// ============================================================================
// Templates
// ============================================================================

pub const VIDEO_ANALYSIS: PromptTemplate = PromptTemplate::new(
    "video_analysis",
    r#"You are an expert short-form video strategist. Watch the attached video and describe how it is built, not what it is about.

Return a single JSON object with these top-level keys:
- "meta": { "primary_tone", "target_audience", "format", "estimated_duration" }
- "hook_analysis": { "technique", "first_line", "visual_hook", "why_it_works" }
- "retention_signals": { "pacing", "narrative_structure", "pattern_interrupts", "visual_style", "color_palette", "audio" }
- "engagement_tactics": { "call_to_action", "emotional_triggers", "community_prompts" }

Every key is required. Use short, concrete phrases. Return JSON only."#,
);

pub const IMAGE_ANALYSIS: PromptTemplate = PromptTemplate::new(
    "image_analysis",
    r#"You are a visual design analyst. Study the attached image and describe its style so it can be reproduced for a different subject.

Return a single JSON object with these top-level keys:
- "subjects": the main subjects and how they are framed
- "setting": location, lighting and time of day
- "style_elements": { "medium", "color_palette", "composition", "mood", "textures" }

Every key is required. Return JSON only."#,
);

pub const SCRIPT: PromptTemplate = PromptTemplate::new(
    "script",
    r#"You are a scriptwriter. Using the style blueprint below as a reference for tone, hook, pacing and structure, write a new {{output_detail}} video script about: {{topic}}

Style blueprint:
{{blueprint}}

Mark every visual direction as [VISUAL: ...] and every audio or voice-over cue as [AUDIO: ...]. Open with a hook that uses the same technique as the blueprint. Return only the script text."#,
);

pub const STORYBOARD: PromptTemplate = PromptTemplate::new(
    "storyboard",
    r#"You are a director preparing prompts for an AI video generator. Using the style blueprint below, plan a new video about: {{topic}}

Style blueprint:
{{blueprint}}

Write between {{min_scenes}} and {{max_scenes}} scenes. Each scene prompt must describe subject, camera movement, lighting and mood in one paragraph, consistent with the blueprint's visual style.

Return a JSON array of strings, one string per scene, and nothing else."#,
);

pub const SOCIAL_POSTS: PromptTemplate = PromptTemplate::new(
    "social_posts",
    r#"Write social media posts announcing new content about: {{topic}}
Additional details: {{details}}

Match the mood described in this style analysis:
{{blueprint}}

Produce one post each for LinkedIn (professional, up to 1300 characters), Twitter (under 280 characters) and Instagram (caption with relevant hashtags)."#,
);

pub const HEADLINE: PromptTemplate = PromptTemplate::new(
    "headline",
    r#"Write one short, punchy headline (at most eight words) for an image about: {{topic}}
Additional details: {{details}}

Return only the headline text without quotes."#,
);

pub const STYLE_DESCRIPTOR: PromptTemplate = PromptTemplate::new(
    "style_descriptor",
    r#"Summarize the visual style in this analysis as one sentence an illustrator could follow. Mention medium, palette, lighting and composition; do not mention the original subjects.

{{blueprint}}

Return only the sentence."#,
);

pub const IMAGE_PROMPT: PromptTemplate = PromptTemplate::new(
    "image_prompt",
    r#"Compose one descriptive paragraph to be used as a prompt for an image generation model.

Subject: {{topic}}
Additional details: {{details}}
Reference style: {{style}}
Style strength: {{influence}}

Rules:
- The scene must not contain any visible text, words, letters, logos or captions.
- If the subject names a real, recognizable person, do not use their name and do not aim for photorealism; describe their distinguishing visual features in an illustrated style instead.
- Describe composition, lighting, palette and mood concretely.

Return only the paragraph."#,
);
