//! Business logic services.

pub mod billing;
pub mod content;
pub mod error;
pub mod image_synthesis;
pub mod ingestion;
pub mod ledger;
pub mod prompts;
pub mod reconciler;
pub mod signatures;
pub mod stripe;
pub mod youtube;

pub use billing::{BillingService, CheckoutError};
pub use content::{ContentPipeline, GenerationOptions, ImageContentOptions, PipelineRun, PipelineStage};
pub use error::{LedgerError, LedgerResult, PipelineError, PipelineResult};
pub use image_synthesis::ImageSynthesizer;
pub use ingestion::IngestionPipeline;
pub use ledger::CreditLedger;
pub use reconciler::{BillingReconciler, ReconcileError, ReconcileOutcome};
pub use signatures::SignatureError;
pub use stripe::{BillingError, PaymentProvider, StripeClient};
pub use youtube::{MetadataError, VideoMetadata, YoutubeClient};
