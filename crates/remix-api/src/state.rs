//! Application state.

use std::sync::Arc;

use anyhow::Context;
use remix_gemini::{ContentModel, GeminiClient, ImageModel, ModelFileStore};
use remix_profiles::{PostgrestProfileStore, ProfileStore};
use remix_storage::{S3SignedUrlIssuer, SignedUrlIssuer};

use crate::auth::{ClerkJwksVerifier, SessionVerifier};
use crate::config::{ApiConfig, BillingConfig, IdentityConfig};
use crate::services::youtube::DEFAULT_YOUTUBE_API_BASE;
use crate::services::{
    BillingReconciler, BillingService, ContentPipeline, CreditLedger, ImageSynthesizer,
    IngestionPipeline, PaymentProvider, StripeClient, VideoMetadata, YoutubeClient,
};

/// External collaborators, constructed once and injected.
#[derive(Clone)]
pub struct Adapters {
    pub sessions: Arc<dyn SessionVerifier>,
    pub storage: Arc<dyn SignedUrlIssuer>,
    pub profiles: Arc<dyn ProfileStore>,
    pub model: Arc<dyn ContentModel>,
    pub files: Arc<dyn ModelFileStore>,
    pub images: Arc<dyn ImageModel>,
    pub payments: Arc<dyn PaymentProvider>,
    pub videos: Arc<dyn VideoMetadata>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub sessions: Arc<dyn SessionVerifier>,
    pub storage: Arc<dyn SignedUrlIssuer>,
    pub profiles: Arc<dyn ProfileStore>,
    pub videos: Arc<dyn VideoMetadata>,
    pub ingestion: IngestionPipeline,
    pub content: ContentPipeline,
    pub ledger: CreditLedger,
    pub billing: BillingService,
    pub reconciler: BillingReconciler,
    /// Svix secret for identity webhooks.
    pub identity_webhook_secret: Arc<str>,
    /// Stripe endpoint secret for billing webhooks.
    pub billing_webhook_secret: Arc<str>,
}

impl AppState {
    /// Create application state from environment configuration.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let identity = IdentityConfig::from_env().context("identity provider config")?;
        let billing = BillingConfig::from_env().context("billing config")?;

        let storage = S3SignedUrlIssuer::from_env().context("object storage")?;
        let gemini = Arc::new(GeminiClient::from_env().context("Gemini client")?);
        let profiles = PostgrestProfileStore::from_env().context("profile store")?;
        let sessions = ClerkJwksVerifier::new(&identity).context("session verifier")?;
        let payments = StripeClient::new(billing.secret_key.clone(), billing.api_base.clone())
            .context("Stripe client")?;
        let videos = YoutubeClient::new(config.youtube_api_key.clone(), DEFAULT_YOUTUBE_API_BASE)
            .context("YouTube client")?;

        let adapters = Adapters {
            sessions: Arc::new(sessions),
            storage: Arc::new(storage),
            profiles: Arc::new(profiles),
            model: gemini.clone(),
            files: gemini.clone(),
            images: gemini,
            payments: Arc::new(payments),
            videos: Arc::new(videos),
        };

        Self::from_adapters(config, identity, billing, adapters)
    }

    /// Wire services over already-built adapters.
    pub fn from_adapters(
        config: ApiConfig,
        identity: IdentityConfig,
        billing: BillingConfig,
        adapters: Adapters,
    ) -> anyhow::Result<Self> {
        let ingestion = IngestionPipeline::new(
            adapters.storage.clone(),
            adapters.files,
            config.poll,
            config.temp_dir.clone(),
        )
        .context("ingestion pipeline")?;

        let images = ImageSynthesizer::new(adapters.model.clone(), adapters.images);
        let content = ContentPipeline::new(adapters.model, images);
        let ledger = CreditLedger::new(adapters.profiles.clone());
        let reconciler = BillingReconciler::new(
            adapters.profiles.clone(),
            billing.plans.clone(),
            billing.top_up_credits,
        );
        let billing_webhook_secret: Arc<str> = Arc::from(billing.webhook_secret.as_str());
        let billing = BillingService::new(
            adapters.payments,
            adapters.profiles.clone(),
            Arc::new(billing),
        );

        Ok(Self {
            config: Arc::new(config),
            sessions: adapters.sessions,
            storage: adapters.storage,
            profiles: adapters.profiles,
            videos: adapters.videos,
            ingestion,
            content,
            ledger,
            billing,
            reconciler,
            identity_webhook_secret: Arc::from(identity.webhook_secret.as_str()),
            billing_webhook_secret,
        })
    }
}
