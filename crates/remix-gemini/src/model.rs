//! Model-facing traits and their request/response values.
//!
//! The pipelines depend on these traits rather than on `GeminiClient`, so
//! tests can substitute in-process fakes.

use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;

use crate::error::GeminiResult;

// ============================================================================
// Content generation
// ============================================================================

/// One part of a multimodal prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum InputPart {
    Text(String),
    /// Reference to a file-store URI or an external video URL.
    FileData { mime_type: String, file_uri: String },
    /// Raw bytes sent inline (images).
    InlineData { mime_type: String, data: Vec<u8> },
}

impl InputPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn file(mime_type: impl Into<String>, file_uri: impl Into<String>) -> Self {
        Self::FileData {
            mime_type: mime_type.into(),
            file_uri: file_uri.into(),
        }
    }

    pub fn inline(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self::InlineData {
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// Requested response shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// `application/json` without a schema.
    Json,
    /// `application/json` constrained by an OpenAPI-style schema.
    JsonSchema(Value),
}

/// A single generation call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentRequest {
    pub parts: Vec<InputPart>,
    pub format: ResponseFormat,
}

impl ContentRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            parts: vec![InputPart::text(prompt)],
            format: ResponseFormat::Text,
        }
    }

    pub fn with_part(mut self, part: InputPart) -> Self {
        self.parts.push(part);
        self
    }

    pub fn json(mut self) -> Self {
        self.format = ResponseFormat::Json;
        self
    }

    pub fn json_schema(mut self, schema: Value) -> Self {
        self.format = ResponseFormat::JsonSchema(schema);
        self
    }

    /// Short label for logs: the part kinds in order.
    pub fn shape(&self) -> String {
        self.parts
            .iter()
            .map(|p| match p {
                InputPart::Text(_) => "text",
                InputPart::FileData { .. } => "file",
                InputPart::InlineData { .. } => "inline",
            })
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// Text/JSON generation.
#[async_trait]
pub trait ContentModel: Send + Sync {
    /// Run one generation and return the concatenated candidate text.
    async fn generate(&self, request: ContentRequest) -> GeminiResult<String>;
}

// ============================================================================
// File store
// ============================================================================

/// Processing state of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Processing,
    Active,
    Failed,
    Unspecified,
}

impl FileState {
    pub fn parse(s: &str) -> Self {
        match s {
            "PROCESSING" => FileState::Processing,
            "ACTIVE" => FileState::Active,
            "FAILED" => FileState::Failed,
            _ => FileState::Unspecified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Processing => "PROCESSING",
            FileState::Active => "ACTIVE",
            FileState::Failed => "FAILED",
            FileState::Unspecified => "STATE_UNSPECIFIED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FileState::Active | FileState::Failed)
    }
}

/// File metadata reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFile {
    /// Resource name, e.g. `files/abc123`.
    pub name: String,
    /// URI usable as `fileData.fileUri`.
    pub uri: String,
    pub mime_type: String,
    pub state: FileState,
    pub size_bytes: Option<u64>,
    /// Provider error message when `state` is `Failed`.
    pub error: Option<String>,
}

/// Large-file ingestion into the model's file store.
#[async_trait]
pub trait ModelFileStore: Send + Sync {
    /// Stream a local file into the store. Never reads the whole file into memory.
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> GeminiResult<ModelFile>;

    /// Fetch current metadata for `name` (`files/...`).
    async fn get_file(&self, name: &str) -> GeminiResult<ModelFile>;
}

// ============================================================================
// Image synthesis
// ============================================================================

/// One synthesized image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub mime_type: String,
    /// Base64 payload exactly as returned by the provider.
    pub base64_data: String,
}

impl GeneratedImage {
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            base64_data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// `data:` URL for direct display by the client.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_data)
    }
}

/// Prompt-to-image synthesis.
#[async_trait]
pub trait ImageModel: Send + Sync {
    /// Generate exactly one image for the prompt.
    async fn generate_image(&self, prompt: &str) -> GeminiResult<GeneratedImage>;
}
