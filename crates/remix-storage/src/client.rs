//! Signed URL issuance over the S3 API.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::keys::{upload_key, validate_upload_key};

/// A signed upload slot handed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUpload {
    /// PUT target, valid for the configured upload TTL.
    pub signed_url: String,
    /// Object key the client must send back to the transfer route.
    pub path: String,
    /// Opaque upload session id (also the key's directory segment).
    pub token: String,
}

/// Issues short-lived signed URLs for staged uploads.
#[async_trait]
pub trait SignedUrlIssuer: Send + Sync {
    /// Mint a signed PUT URL for a new object.
    async fn issue_upload_url(&self, file_name: &str, content_type: &str)
        -> StorageResult<SignedUpload>;

    /// Mint a signed GET URL for an existing staged object.
    async fn issue_download_url(&self, path: &str) -> StorageResult<String>;

    /// Verify the bucket is reachable with the configured credentials.
    async fn check_connectivity(&self) -> StorageResult<()>;
}

/// S3-backed issuer.
#[derive(Clone)]
pub struct S3SignedUrlIssuer {
    client: Client,
    bucket: String,
    upload_ttl: Duration,
    download_ttl: Duration,
}

impl S3SignedUrlIssuer {
    /// Create a new issuer from configuration.
    pub fn new(config: StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "remix-storage",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket,
            upload_ttl: config.upload_ttl,
            download_ttl: config.download_ttl,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(StorageConfig::from_env()?))
    }

    fn presigning(ttl: Duration) -> StorageResult<PresigningConfig> {
        PresigningConfig::expires_in(ttl).map_err(|e| StorageError::presign_failed(e.to_string()))
    }
}

#[async_trait]
impl SignedUrlIssuer for S3SignedUrlIssuer {
    async fn issue_upload_url(
        &self,
        file_name: &str,
        content_type: &str,
    ) -> StorageResult<SignedUpload> {
        let token = Uuid::new_v4().to_string();
        let key = upload_key(&token, file_name);
        debug!(key = %key, content_type, "Presigning upload");

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .presigned(Self::presigning(self.upload_ttl)?)
            .await
            .map_err(|e| StorageError::presign_failed(e.to_string()))?;

        info!(key = %key, ttl_secs = self.upload_ttl.as_secs(), "Issued signed upload URL");

        Ok(SignedUpload {
            signed_url: presigned.uri().to_string(),
            path: key,
            token,
        })
    }

    async fn issue_download_url(&self, path: &str) -> StorageResult<String> {
        validate_upload_key(path)?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path.trim())
            .presigned(Self::presigning(self.download_ttl)?)
            .await
            .map_err(|e| StorageError::presign_failed(e.to_string()))?;

        debug!(key = %path, "Issued signed download URL");
        Ok(presigned.uri().to_string())
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::Unreachable(e.to_string()))?;
        Ok(())
    }
}
