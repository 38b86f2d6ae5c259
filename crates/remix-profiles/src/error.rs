//! Profile store error types.

use thiserror::Error;

/// Result type for profile store operations.
pub type ProfileResult<T> = Result<T, ProfileError>;

/// Marker raised by the `adjust_credits` function when a debit would go negative.
pub const INSUFFICIENT_CREDITS_MARKER: &str = "insufficient_credits";

/// Marker raised by the `adjust_credits` function when the profile is missing.
pub const PROFILE_NOT_FOUND_MARKER: &str = "profile_not_found";

/// Errors that can occur during profile store operations.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Profile store configuration error: {0}")]
    ConfigError(String),

    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Profile already exists: {0}")]
    AlreadyExists(String),

    #[error("Insufficient credits for {0}")]
    InsufficientCredits(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProfileError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    /// Map a PostgREST error response to a typed error.
    ///
    /// `subject` names the row the request targeted (user id, event id).
    pub fn from_http_status(status: u16, subject: &str, body: &str) -> Self {
        if body.contains(INSUFFICIENT_CREDITS_MARKER) {
            return Self::InsufficientCredits(subject.to_string());
        }
        if body.contains(PROFILE_NOT_FOUND_MARKER) {
            return Self::NotFound(subject.to_string());
        }
        match status {
            401 | 403 => Self::PermissionDenied(body.to_string()),
            404 => Self::NotFound(subject.to_string()),
            409 => Self::AlreadyExists(subject.to_string()),
            429 => Self::RateLimited(1000),
            500..=599 => Self::ServerError {
                status,
                message: body.chars().take(500).collect(),
            },
            _ => Self::RequestFailed(format!("{}: {}", status, body)),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProfileError::Network(_) | ProfileError::RateLimited(_) | ProfileError::ServerError { .. }
        )
    }

    /// Delay requested by the server, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProfileError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    /// HTTP-like status for metrics labels.
    pub fn http_status(&self) -> u16 {
        match self {
            ProfileError::NotFound(_) => 404,
            ProfileError::AlreadyExists(_) => 409,
            ProfileError::InsufficientCredits(_) => 400,
            ProfileError::PermissionDenied(_) => 403,
            ProfileError::RateLimited(_) => 429,
            ProfileError::ServerError { status, .. } => *status,
            _ => 500,
        }
    }
}
