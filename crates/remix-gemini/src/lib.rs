//! Gemini REST adapter.
//!
//! This crate provides:
//! - Text / JSON / schema-constrained content generation with model fallback
//! - Resumable, streaming uploads into the Gemini file store
//! - File processing-state lookup
//! - Single-image synthesis via the Imagen `:predict` endpoint

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod schema;
mod wire;

pub use client::GeminiClient;
pub use config::GeminiConfig;
pub use error::{GeminiError, GeminiResult};
pub use model::{
    ContentModel, ContentRequest, FileState, GeneratedImage, ImageModel, InputPart, ModelFile,
    ModelFileStore, ResponseFormat,
};
pub use schema::response_schema;
