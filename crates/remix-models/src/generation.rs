//! Generation options and results.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::blueprint::AnalysisBlueprint;

// ============================================================================
// Options
// ============================================================================

/// Requested output format for phase 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputType {
    /// Free-text script with visual/audio cues.
    #[serde(rename = "Script")]
    Script,
    /// JSON array of per-scene video generation prompts.
    #[serde(rename = "AI Video Prompts")]
    ScenePrompts,
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::Script => "Script",
            OutputType::ScenePrompts => "AI Video Prompts",
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Script" => Ok(OutputType::Script),
            "AI Video Prompts" => Ok(OutputType::ScenePrompts),
            other => Err(format!(
                "outputType must be 'Script' or 'AI Video Prompts', got '{}'",
                other
            )),
        }
    }
}

/// Target length of the generated piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputDetail {
    #[serde(rename = "Short Form", alias = "short_form", alias = "short")]
    ShortForm,
    #[serde(rename = "Long Form", alias = "long_form", alias = "long")]
    LongForm,
}

impl OutputDetail {
    /// Inclusive scene-count bounds for storyboard output.
    pub fn scene_range(&self) -> (usize, usize) {
        match self {
            OutputDetail::ShortForm => (5, 8),
            OutputDetail::LongForm => (8, 15),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputDetail::ShortForm => "Short Form",
            OutputDetail::LongForm => "Long Form",
        }
    }
}

/// Scene-count bounds of the fixed short-form variant used when no detail is given.
pub const DEFAULT_SCENE_RANGE: (usize, usize) = (5, 10);

/// Social platforms that receive a generated post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    LinkedIn,
    Twitter,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::LinkedIn, Platform::Twitter, Platform::Instagram];

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::LinkedIn => "LinkedIn",
            Platform::Twitter => "Twitter",
            Platform::Instagram => "Instagram",
        }
    }
}

/// How strongly the source image's style should drive the synthesized image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct StyleInfluence(u8);

impl StyleInfluence {
    pub const MAX: u8 = 100;

    pub fn new(value: i64) -> Result<Self, String> {
        if !(0..=Self::MAX as i64).contains(&value) {
            return Err(format!("styleInfluence must be between 0 and 100, got {}", value));
        }
        Ok(Self(value as u8))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Natural-language instruction matching the slider position.
    pub fn instruction(&self) -> &'static str {
        match self.0 {
            0..=24 => "Use the reference style only as a loose hint; prioritize the new topic.",
            25..=49 => "Borrow a few recognizable elements of the reference style.",
            50..=74 => "Clearly follow the reference style while adapting it to the new topic.",
            _ => "Match the reference style as closely as possible.",
        }
    }
}

impl Default for StyleInfluence {
    fn default() -> Self {
        Self(50)
    }
}

impl TryFrom<i64> for StyleInfluence {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StyleInfluence> for i64 {
    fn from(value: StyleInfluence) -> Self {
        value.0 as i64
    }
}

impl FromStr for StyleInfluence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| format!("styleInfluence must be a number, got '{}'", s.trim()))?;
        if !value.is_finite() {
            return Err("styleInfluence must be a finite number".to_string());
        }
        Self::new(value.round() as i64)
    }
}

// ============================================================================
// Results
// ============================================================================

/// Phase 2 output for the video flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeneratedContent {
    Script(String),
    ScenePrompts(Vec<String>),
}

impl GeneratedContent {
    pub fn is_empty(&self) -> bool {
        match self {
            GeneratedContent::Script(s) => s.trim().is_empty(),
            GeneratedContent::ScenePrompts(scenes) => scenes.is_empty(),
        }
    }
}

/// Combined analyze + generate result returned by `/api/generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoGenerationResult {
    pub analysis: AnalysisBlueprint,
    pub content: GeneratedContent,
}

/// One post per platform, all required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SocialPosts {
    /// Professional long-form post.
    pub linkedin: String,
    /// Short post within the platform character limit.
    pub twitter: String,
    /// Caption with hashtags.
    pub instagram: String,
}

impl SocialPosts {
    pub fn get(&self, platform: Platform) -> &str {
        match platform {
            Platform::LinkedIn => &self.linkedin,
            Platform::Twitter => &self.twitter,
            Platform::Instagram => &self.instagram,
        }
    }

    /// First platform whose post is blank, if any.
    pub fn first_blank(&self) -> Option<Platform> {
        Platform::ALL
            .into_iter()
            .find(|p| self.get(*p).trim().is_empty())
    }
}

/// Image flow phase 2 output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    /// `data:<mime>;base64,<payload>` URL of the synthesized image.
    pub image_url: String,
    pub posts: SocialPosts,
    /// Present only when the caller opted into a text overlay.
    pub headline: Option<String>,
}
