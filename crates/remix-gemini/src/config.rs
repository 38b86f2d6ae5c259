//! Gemini adapter configuration.

use std::time::Duration;

use crate::error::{GeminiError, GeminiResult};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Content models tried in order until one succeeds.
pub const DEFAULT_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.5-pro"];

pub const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key sent as `x-goog-api-key`
    pub api_key: String,
    /// API root (overridden in tests)
    pub base_url: String,
    /// Content models in fallback order
    pub models: Vec<String>,
    /// Imagen model for `:predict`
    pub image_model: String,
    /// Timeout for generation calls
    pub request_timeout: Duration,
    /// Timeout for the byte transfer of a file upload
    pub upload_timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            request_timeout: Duration::from_secs(300),
            upload_timeout: Duration::from_secs(900),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> GeminiResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GeminiError::config_error("GEMINI_API_KEY not set"))?;

        let mut config = Self::new(api_key);

        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Ok(models) = std::env::var("GEMINI_MODELS") {
            let models = parse_model_list(&models);
            if !models.is_empty() {
                config.models = models;
            }
        }
        if let Ok(image_model) = std::env::var("GEMINI_IMAGE_MODEL") {
            if !image_model.trim().is_empty() {
                config.image_model = image_model.trim().to_string();
            }
        }
        config.request_timeout = Duration::from_secs(
            std::env::var("GEMINI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        );
        config.upload_timeout = Duration::from_secs(
            std::env::var("GEMINI_UPLOAD_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(900),
        );

        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.models = models.iter().map(|m| m.to_string()).collect();
        self
    }
}

fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}
