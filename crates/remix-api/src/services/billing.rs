//! Checkout, top-up and portal session creation.

use std::collections::BTreeMap;
use std::sync::Arc;

use remix_models::UserProfile;
use remix_profiles::{ProfileError, ProfileStore};
use thiserror::Error;
use tracing::info;

use super::stripe::{BillingError, CheckoutMode, CheckoutRequest, CheckoutSession, PaymentProvider};
use crate::config::BillingConfig;

/// Checkout metadata keys read back by the reconciler.
pub const METADATA_USER_ID: &str = "user_id";
pub const METADATA_KIND: &str = "kind";
pub const METADATA_PRICE_ID: &str = "price_id";
pub const KIND_TOP_UP: &str = "top_up";
pub const KIND_SUBSCRIPTION: &str = "subscription";

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Validation(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Top-ups require an active subscription")]
    TopUpNotAllowed,

    #[error("No billing account exists for this user yet")]
    NoCustomer,

    #[error("Billing is not configured: {0}")]
    NotConfigured(&'static str),

    #[error(transparent)]
    Payment(#[from] BillingError),

    #[error(transparent)]
    Store(#[from] ProfileError),
}

pub type CheckoutResult<T> = Result<T, CheckoutError>;

#[derive(Clone)]
pub struct BillingService {
    payments: Arc<dyn PaymentProvider>,
    profiles: Arc<dyn ProfileStore>,
    config: Arc<BillingConfig>,
}

impl BillingService {
    pub fn new(
        payments: Arc<dyn PaymentProvider>,
        profiles: Arc<dyn ProfileStore>,
        config: Arc<BillingConfig>,
    ) -> Self {
        Self {
            payments,
            profiles,
            config,
        }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    async fn load_profile(&self, user_id: &str) -> CheckoutResult<UserProfile> {
        self.profiles
            .get_profile(user_id)
            .await?
            .ok_or_else(|| CheckoutError::ProfileNotFound(user_id.to_string()))
    }

    /// Existing Stripe customer id, or a new customer persisted on the profile.
    async fn ensure_customer(&self, profile: &UserProfile) -> CheckoutResult<String> {
        if let Some(existing) = &profile.stripe_customer_id {
            return Ok(existing.clone());
        }
        let customer_id = self
            .payments
            .create_customer(&profile.id, profile.email.as_deref())
            .await?;
        self.profiles.set_customer_id(&profile.id, &customer_id).await?;
        info!(user_id = %profile.id, customer_id = %customer_id, "Created billing customer");
        Ok(customer_id)
    }

    fn return_url(&self, path: &str) -> String {
        format!("{}{}", self.config.app_base_url, path)
    }

    /// Subscription checkout for a catalog price.
    pub async fn create_checkout_session(&self, user_id: &str, price_id: &str) -> CheckoutResult<CheckoutSession> {
        let plan = self
            .config
            .plans
            .get(price_id)
            .ok_or_else(|| CheckoutError::Validation(format!("unknown price id '{}'", price_id)))?;

        let profile = self.load_profile(user_id).await?;
        let customer_id = self.ensure_customer(&profile).await?;

        let request = CheckoutRequest {
            customer_id,
            price_id: plan.price_id.clone(),
            mode: CheckoutMode::Subscription,
            success_url: self.return_url("/dashboard?checkout=success"),
            cancel_url: self.return_url("/pricing?checkout=canceled"),
            metadata: BTreeMap::from([
                (METADATA_USER_ID.to_string(), user_id.to_string()),
                (METADATA_KIND.to_string(), KIND_SUBSCRIPTION.to_string()),
                (METADATA_PRICE_ID.to_string(), plan.price_id.clone()),
            ]),
        };
        let session = self.payments.create_checkout_session(&request).await?;
        info!(user_id, price_id, tier = %plan.tier, session_id = %session.id, "Checkout session created");
        Ok(session)
    }

    /// One-time credit purchase; paying tiers only.
    pub async fn create_top_up_session(&self, user_id: &str) -> CheckoutResult<CheckoutSession> {
        let price_id = self
            .config
            .top_up_price_id
            .clone()
            .ok_or(CheckoutError::NotConfigured("STRIPE_TOP_UP_PRICE_ID"))?;

        let profile = self.load_profile(user_id).await?;
        if !profile.can_top_up() {
            return Err(CheckoutError::TopUpNotAllowed);
        }
        let customer_id = self.ensure_customer(&profile).await?;

        let request = CheckoutRequest {
            customer_id,
            price_id,
            mode: CheckoutMode::Payment,
            success_url: self.return_url("/dashboard?top_up=success"),
            cancel_url: self.return_url("/dashboard?top_up=canceled"),
            metadata: BTreeMap::from([
                (METADATA_USER_ID.to_string(), user_id.to_string()),
                (METADATA_KIND.to_string(), KIND_TOP_UP.to_string()),
            ]),
        };
        let session = self.payments.create_checkout_session(&request).await?;
        info!(user_id, session_id = %session.id, "Top-up session created");
        Ok(session)
    }

    /// Self-service portal for an existing customer.
    pub async fn create_portal_session(&self, user_id: &str) -> CheckoutResult<String> {
        let profile = self.load_profile(user_id).await?;
        let customer_id = profile.stripe_customer_id.ok_or(CheckoutError::NoCustomer)?;
        let url = self
            .payments
            .create_portal_session(&customer_id, &self.return_url("/dashboard"))
            .await?;
        info!(user_id, "Portal session created");
        Ok(url)
    }
}
