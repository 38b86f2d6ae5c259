//! Shared data models for the Remix backend.
//!
//! This crate provides Serde-serializable types for:
//! - Media references handed to the model
//! - Analysis blueprints and their required schema fields
//! - Generation options and results (scripts, scene prompts, image content)
//! - User profiles, subscription tiers and the plan catalog
//! - Helpers for validating source video URLs

pub mod blueprint;
pub mod generation;
pub mod media;
pub mod plan;
pub mod profile;
pub mod utils;

// Re-export common types
pub use blueprint::{AnalysisBlueprint, BlueprintError, BlueprintKind};
pub use generation::{
    GeneratedContent, ImageContent, OutputDetail, OutputType, Platform, SocialPosts,
    StyleInfluence, VideoGenerationResult, DEFAULT_SCENE_RANGE,
};
pub use media::{MediaReference, MediaSource};
pub use plan::{PlanCatalog, PlanCatalogError, PlanEntry};
pub use profile::{
    CreditAdjustment, CreditReason, NewProfile, SubscriptionPatch, SubscriptionTier, UserProfile,
    STARTING_CREDITS,
};
pub use utils::{extract_youtube_id, is_youtube_url, YoutubeIdError, YoutubeIdResult};
