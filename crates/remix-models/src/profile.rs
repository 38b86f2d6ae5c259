//! User profile data models.
//!
//! Profiles are keyed by the identity provider's user id and hold the credit
//! balance plus the subscription fields written by billing reconciliation.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Credits granted when the identity provider reports a new user.
pub const STARTING_CREDITS: i64 = 3;

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
    Studio,
}

impl SubscriptionTier {
    /// Parse a tier name (case-insensitive). Unknown names yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "free" => Some(SubscriptionTier::Free),
            "pro" => Some(SubscriptionTier::Pro),
            "studio" => Some(SubscriptionTier::Studio),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Pro => "pro",
            SubscriptionTier::Studio => "studio",
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, SubscriptionTier::Free)
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted user profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UserProfile {
    /// Identity provider user id (primary key).
    pub id: String,

    /// Email captured at account creation.
    #[serde(default)]
    pub email: Option<String>,

    /// Non-negative credit balance. Only changed through atomic adjustments.
    pub credit_balance: i64,

    #[serde(default)]
    pub subscription_tier: Option<SubscriptionTier>,

    /// Provider subscription status (`active`, `past_due`, `canceled`, ...).
    #[serde(default)]
    pub subscription_status: Option<String>,

    /// Price id of the current plan.
    #[serde(default)]
    pub subscription_plan_id: Option<String>,

    #[serde(default)]
    pub stripe_customer_id: Option<String>,

    #[serde(default)]
    pub stripe_subscription_id: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Tier with `free` as the fallback for rows never touched by billing.
    pub fn tier(&self) -> SubscriptionTier {
        self.subscription_tier.unwrap_or_default()
    }

    pub fn has_credits(&self) -> bool {
        self.credit_balance > 0
    }

    /// Top-ups are reserved for paying subscribers.
    pub fn can_top_up(&self) -> bool {
        self.tier().is_paid()
    }
}

/// Why a balance changed. Recorded in logs and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditReason {
    /// One paid generation consumed.
    Generation,
    /// One-time top-up purchase.
    TopUp,
    /// Subscription checkout or renewal grant.
    Subscription,
}

impl CreditReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditReason::Generation => "generation",
            CreditReason::TopUp => "top_up",
            CreditReason::Subscription => "subscription",
        }
    }
}

/// A signed adjustment applied atomically to one balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAdjustment {
    pub user_id: String,
    /// Negative for consumption, positive for grants. Never zero.
    pub delta: i64,
    pub reason: CreditReason,
}

impl CreditAdjustment {
    pub fn debit(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            delta: -1,
            reason: CreditReason::Generation,
        }
    }

    pub fn grant(user_id: impl Into<String>, amount: i64, reason: CreditReason) -> Self {
        Self {
            user_id: user_id.into(),
            delta: amount,
            reason,
        }
    }
}

/// Insert payload for a new profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: String,
    pub email: Option<String>,
    pub credit_balance: i64,
    pub subscription_tier: SubscriptionTier,
}

impl NewProfile {
    /// Profile for a freshly signed-up user: starting grant, free tier.
    pub fn signup(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
            credit_balance: STARTING_CREDITS,
            subscription_tier: SubscriptionTier::Free,
        }
    }

    pub fn into_profile(self, created_at: DateTime<Utc>) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email,
            credit_balance: self.credit_balance,
            subscription_tier: Some(self.subscription_tier),
            subscription_status: None,
            subscription_plan_id: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: Some(created_at),
        }
    }
}

/// Partial update of the subscription columns. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_tier: Option<SubscriptionTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_subscription_id: Option<String>,
}

impl SubscriptionPatch {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            subscription_status: Some(status.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subscription_tier.is_none()
            && self.subscription_status.is_none()
            && self.subscription_plan_id.is_none()
            && self.stripe_subscription_id.is_none()
    }

    /// Apply the set fields onto a profile.
    pub fn apply_to(&self, profile: &mut UserProfile) {
        if let Some(tier) = self.subscription_tier {
            profile.subscription_tier = Some(tier);
        }
        if let Some(status) = &self.subscription_status {
            profile.subscription_status = Some(status.clone());
        }
        if let Some(plan) = &self.subscription_plan_id {
            profile.subscription_plan_id = Some(plan.clone());
        }
        if let Some(sub) = &self.stripe_subscription_id {
            profile.stripe_subscription_id = Some(sub.clone());
        }
    }
}
