//! S3-compatible object storage adapter.
//!
//! This crate provides:
//! - Signed, short-lived upload URLs for client-side staging
//! - Signed download URLs used by the ingestion relay
//! - Upload key construction and validation
//! - A bucket connectivity check for readiness probes

pub mod client;
pub mod config;
pub mod error;
pub mod keys;

pub use client::{S3SignedUrlIssuer, SignedUpload, SignedUrlIssuer};
pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use keys::{sanitize_file_name, upload_key, validate_upload_key, UPLOAD_PREFIX};
