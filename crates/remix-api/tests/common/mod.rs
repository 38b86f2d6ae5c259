//! In-process fakes and router helpers shared by the API tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use remix_api::auth::{SessionClaims, SessionVerifier};
use remix_api::config::{BillingConfig, IdentityConfig, PollPolicy};
use remix_api::services::stripe::{BillingResult, CheckoutRequest, CheckoutSession};
use remix_api::services::{MetadataError, PaymentProvider, VideoMetadata};
use remix_api::{create_router, Adapters, ApiConfig, ApiError, AppState};
use remix_gemini::{
    ContentModel, ContentRequest, FileState, GeminiError, GeminiResult, GeneratedImage, ImageModel,
    InputPart, ModelFile, ModelFileStore, ResponseFormat,
};
use remix_models::{NewProfile, PlanCatalog, SubscriptionTier};
use remix_profiles::MemoryProfileStore;
use remix_storage::{upload_key, SignedUpload, SignedUrlIssuer, StorageResult};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::ServiceExt;

pub const USER: &str = "user_2abc";
pub const SVIX_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
pub const STRIPE_SECRET: &str = "whsec_stripe_test";
pub const PRO_PRICE: &str = "price_pro";
pub const TOP_UP_PRICE: &str = "price_top_up";

// ============================================================================
// Fakes
// ============================================================================

/// Accepts `Bearer valid-<user id>`.
pub struct StaticSessions;

#[async_trait]
impl SessionVerifier for StaticSessions {
    async fn verify(&self, token: &str) -> Result<SessionClaims, ApiError> {
        let sub = token
            .strip_prefix("valid-")
            .ok_or_else(|| ApiError::unauthorized("Token validation failed"))?;
        Ok(SessionClaims {
            sub: sub.to_string(),
            sid: Some("sess_1".to_string()),
            iss: None,
            exp: i64::MAX,
            iat: None,
        })
    }
}

/// Signs nothing; download URLs point at `download_base`.
pub struct FakeStorage {
    pub download_base: String,
}

#[async_trait]
impl SignedUrlIssuer for FakeStorage {
    async fn issue_upload_url(&self, file_name: &str, _content_type: &str) -> StorageResult<SignedUpload> {
        let path = upload_key("session-1", file_name);
        Ok(SignedUpload {
            signed_url: format!("https://bucket.example.com/{}?X-Amz-Signature=abc", path),
            path,
            token: "session-1".to_string(),
        })
    }

    async fn issue_download_url(&self, path: &str) -> StorageResult<String> {
        Ok(format!("{}/{}", self.download_base, path))
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Canned model responses chosen by request shape.
#[derive(Default)]
pub struct CannedModel {
    /// `Json` responses (phase 1 analysis).
    pub analysis: String,
    /// `JsonSchema` responses (social posts).
    pub structured: String,
    /// Plain text responses (scripts, storyboards, style, headline).
    pub text: String,
    /// Fail every call with a quota error.
    pub exhausted: bool,
    pub requests: Mutex<Vec<ContentRequest>>,
}

#[async_trait]
impl ContentModel for CannedModel {
    async fn generate(&self, request: ContentRequest) -> GeminiResult<String> {
        let format = request.format.clone();
        self.requests.lock().await.push(request);
        if self.exhausted {
            return Err(GeminiError::QuotaExceeded("RESOURCE_EXHAUSTED".to_string()));
        }
        Ok(match format {
            ResponseFormat::Json => self.analysis.clone(),
            ResponseFormat::JsonSchema(_) => self.structured.clone(),
            ResponseFormat::Text => self.text.clone(),
        })
    }
}

impl CannedModel {
    pub async fn file_parts(&self) -> Vec<String> {
        self.requests
            .lock()
            .await
            .iter()
            .flat_map(|r| r.parts.iter())
            .filter_map(|p| match p {
                InputPart::FileData { file_uri, .. } => Some(file_uri.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Upload lands as processing, first status check reports active.
#[derive(Default)]
pub struct FakeFiles {
    pub uploaded: Mutex<Vec<(String, u64)>>,
}

#[async_trait]
impl ModelFileStore for FakeFiles {
    async fn upload_file(&self, path: &Path, mime_type: &str, display_name: &str) -> GeminiResult<ModelFile> {
        let size = tokio::fs::metadata(path).await?.len();
        self.uploaded
            .lock()
            .await
            .push((display_name.to_string(), size));
        Ok(ModelFile {
            name: "files/abc123".to_string(),
            uri: String::new(),
            mime_type: mime_type.to_string(),
            state: FileState::Processing,
            size_bytes: Some(size),
            error: None,
        })
    }

    async fn get_file(&self, name: &str) -> GeminiResult<ModelFile> {
        Ok(ModelFile {
            name: name.to_string(),
            uri: format!("https://generativelanguage.googleapis.com/v1beta/{}", name),
            mime_type: "video/mp4".to_string(),
            state: FileState::Active,
            size_bytes: None,
            error: None,
        })
    }
}

/// Returns a tiny PNG, or nothing when `blocked`.
#[derive(Default)]
pub struct FakeImages {
    pub blocked: bool,
}

#[async_trait]
impl ImageModel for FakeImages {
    async fn generate_image(&self, _prompt: &str) -> GeminiResult<GeneratedImage> {
        if self.blocked {
            return Err(GeminiError::Blocked("SAFETY".to_string()));
        }
        Ok(GeneratedImage::from_bytes("image/png", b"\x89PNG"))
    }
}

#[derive(Default)]
pub struct RecordingPayments {
    pub checkouts: Mutex<Vec<CheckoutRequest>>,
}

#[async_trait]
impl PaymentProvider for RecordingPayments {
    async fn create_customer(&self, _user_id: &str, _email: Option<&str>) -> BillingResult<String> {
        Ok("cus_new".to_string())
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> BillingResult<CheckoutSession> {
        self.checkouts.lock().await.push(request.clone());
        Ok(CheckoutSession {
            id: "cs_test_1".to_string(),
            url: Some("https://checkout.stripe.com/c/cs_test_1".to_string()),
        })
    }

    async fn create_portal_session(&self, customer_id: &str, _return_url: &str) -> BillingResult<String> {
        Ok(format!("https://billing.stripe.com/p/{}", customer_id))
    }
}

pub struct FixedDuration(pub u64);

#[async_trait]
impl VideoMetadata for FixedDuration {
    async fn duration_secs(&self, _video_id: &str) -> Result<u64, MetadataError> {
        Ok(self.0)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct TestApp {
    pub router: Router,
    pub profiles: Arc<MemoryProfileStore>,
    pub model: Arc<CannedModel>,
    pub files: Arc<FakeFiles>,
    pub payments: Arc<RecordingPayments>,
    pub temp_dir: TempDir,
}

pub struct TestAppBuilder {
    model: CannedModel,
    images: FakeImages,
    download_base: String,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            model: CannedModel::default(),
            images: FakeImages::default(),
            download_base: "http://127.0.0.1:9".to_string(),
        }
    }

    pub fn model(mut self, model: CannedModel) -> Self {
        self.model = model;
        self
    }

    pub fn images(mut self, images: FakeImages) -> Self {
        self.images = images;
        self
    }

    pub fn download_base(mut self, base: impl Into<String>) -> Self {
        self.download_base = base.into();
        self
    }

    pub async fn build(self) -> TestApp {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = ApiConfig {
            poll: PollPolicy {
                interval: Duration::from_millis(5),
                max_polls: 3,
                deadline: Duration::from_secs(5),
            },
            temp_dir: temp_dir.path().to_path_buf(),
            ..ApiConfig::default()
        };
        let identity = IdentityConfig {
            jwks_url: "http://127.0.0.1:9/jwks".to_string(),
            issuer: None,
            webhook_secret: SVIX_SECRET.to_string(),
        };
        let billing = BillingConfig {
            secret_key: "sk_test".to_string(),
            webhook_secret: STRIPE_SECRET.to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
            app_base_url: "https://app.example.com".to_string(),
            top_up_price_id: Some(TOP_UP_PRICE.to_string()),
            top_up_credits: 50,
            plans: PlanCatalog::parse(&format!("{}:pro:100", PRO_PRICE)).unwrap(),
        };

        let profiles = Arc::new(MemoryProfileStore::new());
        let model = Arc::new(self.model);
        let files = Arc::new(FakeFiles::default());
        let payments = Arc::new(RecordingPayments::default());

        let adapters = Adapters {
            sessions: Arc::new(StaticSessions),
            storage: Arc::new(FakeStorage {
                download_base: self.download_base,
            }),
            profiles: profiles.clone(),
            model: model.clone(),
            files: files.clone(),
            images: Arc::new(self.images),
            payments: payments.clone(),
            videos: Arc::new(FixedDuration(213)),
        };

        let state = AppState::from_adapters(config, identity, billing, adapters).unwrap();
        TestApp {
            router: create_router(state, None),
            profiles,
            model,
            files,
            payments,
            temp_dir,
        }
    }
}

impl TestApp {
    pub async fn seed_profile(&self, user_id: &str, credits: i64, tier: SubscriptionTier) {
        let mut profile = NewProfile::signup(user_id, Some(format!("{}@example.com", user_id)))
            .into_profile(chrono::Utc::now());
        profile.credit_balance = credits;
        profile.subscription_tier = Some(tier);
        self.profiles.insert(profile).await;
    }

    pub async fn send(&self, request: Request<Body>) -> (u16, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        read_json(response).await
    }

    pub fn temp_files(&self) -> usize {
        std::fs::read_dir(self.temp_dir.path()).unwrap().count()
    }
}

pub async fn read_json(response: Response<Body>) -> (u16, Value) {
    let status = response.status().as_u16();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, body)
}

// ============================================================================
// Request builders
// ============================================================================

pub fn authed_json(uri: &str, user: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer valid-{}", user))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed_get(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer valid-{}", user))
        .body(Body::empty())
        .unwrap()
}

pub const BOUNDARY: &str = "remix-test-boundary";

/// Single-file multipart body plus optional text fields.
pub fn multipart_body(file: Option<(&str, &str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, mime, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file_name, mime
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn authed_multipart(uri: &str, user: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer valid-{}", user))
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn stripe_request(body: &Value, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/stripe-webhook")
        .header("content-type", "application/json")
        .header("stripe-signature", signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn svix_request(id: &str, timestamp: i64, body: &Value, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/clerk-webhook")
        .header("content-type", "application/json")
        .header("svix-id", id)
        .header("svix-timestamp", timestamp.to_string())
        .header("svix-signature", signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}
