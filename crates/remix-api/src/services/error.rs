//! Service-layer error types.

use remix_gemini::GeminiError;
use remix_models::BlueprintError;
use remix_profiles::ProfileError;
use remix_storage::StorageError;
use thiserror::Error;

use super::content::PipelineStage;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failures of the ingestion and content pipelines.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error("Could not authorize storage access: {0}")]
    StorageAuthFailed(String),

    #[error("Download from storage failed with status {status}")]
    DownloadFailed { status: u16 },

    #[error("Upload to the model file store failed: {0}")]
    UploadFailed(String),

    #[error("File processing failed: {0}")]
    IngestionFailed(String),

    #[error("File was not ready after {polls} status checks")]
    IngestionTimeout { polls: u32 },

    #[error("Analysis output was malformed: {0}")]
    AnalysisMalformed(String),

    #[error("Generated content was malformed: {0}")]
    GenerationMalformed(String),

    /// The image model produced nothing; usually a safety filter.
    #[error("Image synthesis failed: {0}")]
    ImageSynthesisFailed(String),

    #[error("The model is overloaded: {0}")]
    UpstreamQuotaExceeded(String),

    #[error("The model timed out: {0}")]
    UpstreamTimeout(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Invalid pipeline transition from {from:?} to {to:?}")]
    InvalidTransition { from: PipelineStage, to: PipelineStage },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn analysis_malformed(err: BlueprintError) -> Self {
        Self::AnalysisMalformed(err.to_string())
    }

    pub fn generation_malformed(msg: impl Into<String>) -> Self {
        Self::GenerationMalformed(msg.into())
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::StorageAuthFailed(_) => "storage_auth_failed",
            Self::DownloadFailed { .. } => "download_failed",
            Self::UploadFailed(_) => "upload_failed",
            Self::IngestionFailed(_) => "ingestion_failed",
            Self::IngestionTimeout { .. } => "ingestion_timeout",
            Self::AnalysisMalformed(_) => "analysis_malformed",
            Self::GenerationMalformed(_) => "generation_malformed",
            Self::ImageSynthesisFailed(_) => "image_synthesis_failed",
            Self::UpstreamQuotaExceeded(_) => "upstream_quota",
            Self::UpstreamTimeout(_) => "upstream_timeout",
            Self::Upstream(_) => "upstream",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Io(_) => "io",
        }
    }
}

impl From<GeminiError> for PipelineError {
    fn from(err: GeminiError) -> Self {
        if err.is_quota() {
            return Self::UpstreamQuotaExceeded(err.to_string());
        }
        if err.is_timeout() {
            return Self::UpstreamTimeout(err.to_string());
        }
        match err {
            GeminiError::UploadFailed(msg) => Self::UploadFailed(msg),
            GeminiError::Io(e) => Self::Io(e),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        if err.is_client_error() {
            return Self::Validation(err.to_string());
        }
        Self::StorageAuthFailed(err.to_string())
    }
}

// ============================================================================
// Ledger
// ============================================================================

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient credits")]
    InsufficientCredits,

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Invalid credit amount: {0}")]
    InvalidAmount(i64),

    #[error("Profile store error: {0}")]
    Store(ProfileError),
}

impl From<ProfileError> for LedgerError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::InsufficientCredits(_) => Self::InsufficientCredits,
            ProfileError::NotFound(id) => Self::ProfileNotFound(id),
            other => Self::Store(other),
        }
    }
}
