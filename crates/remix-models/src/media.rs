//! Media references handed to the model for inference.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Where a media reference points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    /// A handle inside the model provider's file store.
    ModelFile,
    /// An externally reachable video URL (e.g. a YouTube watch link).
    ExternalUrl,
}

/// A video or image that is ready for inference.
///
/// Transient: produced by ingestion (or supplied directly by the client for
/// URL sources) and consumed once per generation request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaReference {
    /// File-store URI or external URL.
    pub uri: String,
    /// Declared MIME type, supplied by the caller (never sniffed).
    pub mime_type: String,
}

impl MediaReference {
    /// Build a reference, rejecting empty fields and unparseable URLs.
    pub fn new(uri: impl Into<String>, mime_type: impl Into<String>) -> Result<Self, String> {
        let uri = uri.into().trim().to_string();
        let mime_type = mime_type.into().trim().to_string();

        if uri.is_empty() {
            return Err("videoSource is required".to_string());
        }
        if mime_type.is_empty() {
            return Err("mimeType is required".to_string());
        }
        if !mime_type.contains('/') {
            return Err(format!("mimeType '{}' is not a valid MIME type", mime_type));
        }
        if Url::parse(&uri).is_err() {
            return Err("videoSource must be a file URI or an absolute URL".to_string());
        }

        Ok(Self { uri, mime_type })
    }

    /// Classify the reference by inspecting its URI.
    ///
    /// Model file-store URIs live under the provider's `/files/` namespace.
    pub fn source(&self) -> MediaSource {
        match Url::parse(&self.uri) {
            Ok(url)
                if url
                    .host_str()
                    .map(|h| h.ends_with("generativelanguage.googleapis.com"))
                    .unwrap_or(false)
                    && url.path().contains("/files/") =>
            {
                MediaSource::ModelFile
            }
            _ => MediaSource::ExternalUrl,
        }
    }

    /// True when the reference points at a video.
    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }
}
