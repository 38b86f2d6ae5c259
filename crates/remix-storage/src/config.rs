//! Storage configuration.

use std::time::Duration;

use crate::error::{StorageError, StorageResult};

/// Default lifetime of signed upload URLs.
pub const DEFAULT_UPLOAD_TTL_SECS: u64 = 60;

/// Default lifetime of signed download URLs.
pub const DEFAULT_DOWNLOAD_TTL_SECS: u64 = 60;

/// Configuration for the object storage adapter.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket holding staged uploads
    pub bucket: String,
    /// Region ("auto" for most S3-compatible providers)
    pub region: String,
    /// Lifetime of signed upload URLs
    pub upload_ttl: Duration,
    /// Lifetime of signed download URLs
    pub download_ttl: Duration,
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: required("STORAGE_ENDPOINT_URL")?,
            access_key_id: required("STORAGE_ACCESS_KEY_ID")?,
            secret_access_key: required("STORAGE_SECRET_ACCESS_KEY")?,
            bucket: required("STORAGE_BUCKET")?,
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "auto".to_string()),
            upload_ttl: Duration::from_secs(secs_or("SIGNED_UPLOAD_TTL_SECS", DEFAULT_UPLOAD_TTL_SECS)),
            download_ttl: Duration::from_secs(secs_or(
                "SIGNED_DOWNLOAD_TTL_SECS",
                DEFAULT_DOWNLOAD_TTL_SECS,
            )),
        })
    }
}

fn required(name: &str) -> StorageResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| StorageError::config_error(format!("{} not set", name)))
}

fn secs_or(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn set_required() {
        std::env::set_var("STORAGE_ENDPOINT_URL", "https://s3.example.com");
        std::env::set_var("STORAGE_ACCESS_KEY_ID", "key");
        std::env::set_var("STORAGE_SECRET_ACCESS_KEY", "secret");
        std::env::set_var("STORAGE_BUCKET", "uploads");
    }

    #[test]
    #[serial]
    fn test_defaults() {
        set_required();
        std::env::remove_var("SIGNED_UPLOAD_TTL_SECS");
        std::env::remove_var("STORAGE_REGION");
        let config = StorageConfig::from_env().unwrap();
        assert_eq!(config.upload_ttl, Duration::from_secs(60));
        assert_eq!(config.region, "auto");
    }

    #[test]
    #[serial]
    fn test_missing_bucket_is_an_error() {
        set_required();
        std::env::remove_var("STORAGE_BUCKET");
        let err = StorageConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("STORAGE_BUCKET"));
    }
}
