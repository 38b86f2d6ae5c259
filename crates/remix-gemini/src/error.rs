//! Gemini adapter error types.

use thiserror::Error;

pub type GeminiResult<T> = Result<T, GeminiError>;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Gemini configuration error: {0}")]
    ConfigError(String),

    /// The provider reported resource exhaustion (HTTP 429 / RESOURCE_EXHAUSTED).
    #[error("Gemini quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Gemini request timed out: {0}")]
    Timeout(String),

    #[error("Gemini returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The prompt or candidate was withheld by a safety filter.
    #[error("Gemini blocked the request: {0}")]
    Blocked(String),

    #[error("Gemini returned no content from model {0}")]
    EmptyResponse(String),

    /// Image model answered without image bytes. `raw` is the response body.
    #[error("Image model returned no image")]
    NoImage { raw: String },

    #[error("Invalid Gemini response: {0}")]
    InvalidResponse(String),

    #[error("File upload failed: {0}")]
    UploadFailed(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeminiError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    /// Classify a non-2xx response by status and body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_error_message(body);
        if status == 429 || body.contains("RESOURCE_EXHAUSTED") {
            Self::QuotaExceeded(message)
        } else if status == 504 || status == 408 || body.contains("DEADLINE_EXCEEDED") {
            Self::Timeout(message)
        } else {
            Self::Upstream { status, message }
        }
    }

    /// Classify a transport error, separating timeouts from other failures.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Network(err)
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, GeminiError::QuotaExceeded(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GeminiError::Timeout(_))
    }

    /// Whether the next configured model should be tried.
    pub fn should_fall_back(&self) -> bool {
        match self {
            GeminiError::QuotaExceeded(_)
            | GeminiError::Network(_)
            | GeminiError::EmptyResponse(_) => true,
            GeminiError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            GeminiError::QuotaExceeded(_) => "quota",
            GeminiError::Timeout(_) => "timeout",
            GeminiError::Upstream { .. } => "upstream",
            GeminiError::Blocked(_) | GeminiError::NoImage { .. } => "blocked",
            GeminiError::Network(_) => "network",
            _ => "error",
        }
    }
}

/// Pull `error.message` out of a Google API error body, falling back to the raw text.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(500).collect())
}
