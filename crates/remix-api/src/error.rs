//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use remix_storage::StorageError;

use crate::services::{
    CheckoutError, LedgerError, MetadataError, PipelineError, ReconcileError, SignatureError,
};

pub type ApiResult<T> = Result<T, ApiError>;

const OVERLOADED: &str = "The AI model is currently overloaded. Please wait a moment and try again.";
const TIMED_OUT: &str = "The AI model took too long to respond. Please try again, or use a shorter video.";
const IMAGE_REJECTED: &str =
    "The image could not be generated, most likely because of content safety filters. Try adjusting your topic.";
const MODEL_OUTPUT: &str = "The AI model returned an unexpected response. Please try again.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Insufficient credits")]
    PaymentRequired,

    /// Image model refused or produced nothing for the composed prompt.
    #[error("Image synthesis rejected")]
    ImageRejected,

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Upstream model overloaded")]
    Overloaded,

    #[error("Upstream model timed out")]
    UpstreamTimeout,

    /// Model output failed validation; shown with a generic retry message.
    #[error("Malformed model output: {0}")]
    ModelOutput(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) | ApiError::InvalidSignature(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            ApiError::ImageRejected => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimited | ApiError::Overloaded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ModelOutput(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client.
    fn public_message(&self) -> String {
        match self {
            ApiError::ModelOutput(_) => MODEL_OUTPUT.to_string(),
            ApiError::ImageRejected => IMAGE_REJECTED.to_string(),
            ApiError::Overloaded => OVERLOADED.to_string(),
            ApiError::UpstreamTimeout => TIMED_OUT.to_string(),
            ApiError::Internal(_) | ApiError::Unavailable(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Conversions from service errors
// ============================================================================

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(msg) => ApiError::Validation(msg),
            PipelineError::UpstreamQuotaExceeded(_) => ApiError::Overloaded,
            PipelineError::UpstreamTimeout(_) | PipelineError::IngestionTimeout { .. } => {
                ApiError::UpstreamTimeout
            }
            PipelineError::ImageSynthesisFailed(_) => ApiError::ImageRejected,
            PipelineError::AnalysisMalformed(msg) | PipelineError::GenerationMalformed(msg) => {
                ApiError::ModelOutput(msg)
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits => ApiError::PaymentRequired,
            LedgerError::ProfileNotFound(id) => ApiError::NotFound(format!("profile {}", id)),
            LedgerError::InvalidAmount(amount) => {
                ApiError::BadRequest(format!("invalid credit amount {}", amount))
            }
            LedgerError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Validation(msg) => ApiError::Validation(msg),
            CheckoutError::ProfileNotFound(id) => ApiError::NotFound(format!("profile {}", id)),
            CheckoutError::TopUpNotAllowed => ApiError::Forbidden(err.to_string()),
            CheckoutError::NoCustomer => ApiError::BadRequest(err.to_string()),
            CheckoutError::NotConfigured(_) => ApiError::Unavailable(err.to_string()),
            CheckoutError::Payment(_) | CheckoutError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Malformed(msg) => ApiError::BadRequest(msg),
            // 5xx so the provider retries the delivery.
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SignatureError> for ApiError {
    fn from(err: SignatureError) -> Self {
        ApiError::InvalidSignature(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        if err.is_client_error() {
            ApiError::Validation(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<MetadataError> for ApiError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound(id) => ApiError::NotFound(format!("video {}", id)),
            MetadataError::NotConfigured => ApiError::Unavailable(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
