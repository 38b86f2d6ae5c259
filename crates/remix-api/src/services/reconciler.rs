//! Billing event reconciler.
//!
//! Maps verified payment and identity webhook events onto profile state.
//! Callers must verify the signature before handing the body over. Each
//! handled event id is claimed once; a replay is acknowledged without
//! mutation, and a failed mutation releases its claim so the provider's
//! retry can apply it.

use std::collections::HashMap;
use std::sync::Arc;

use remix_models::{CreditReason, NewProfile, PlanCatalog, SubscriptionPatch, SubscriptionTier};
use remix_profiles::{ProfileError, ProfileStore};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::billing::{KIND_TOP_UP, METADATA_KIND, METADATA_PRICE_ID, METADATA_USER_ID};
use super::error::LedgerError;
use super::ledger::CreditLedger;
use crate::metrics::record_webhook_event;

pub const SOURCE_STRIPE: &str = "stripe";
pub const SOURCE_CLERK: &str = "clerk";

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("malformed event: {0}")]
    Malformed(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] ProfileError),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied,
    /// Event id was already processed.
    Duplicate,
    /// Event type is not one we act on.
    Ignored,
    /// Handled type, but nothing to change (logged).
    Skipped(String),
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Applied => "applied",
            ReconcileOutcome::Duplicate => "duplicate",
            ReconcileOutcome::Ignored => "ignored",
            ReconcileOutcome::Skipped(_) => "skipped",
        }
    }
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    type_: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    mode: Option<String>,
    customer: Option<String>,
    subscription: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    billing_reason: Option<String>,
    customer: Option<String>,
    #[serde(default)]
    lines: InvoiceLines,
}

#[derive(Debug, Default, Deserialize)]
struct InvoiceLines {
    #[serde(default)]
    data: Vec<Value>,
}

impl InvoiceObject {
    /// Price id of the first line, across the old (`price.id`) and new
    /// (`pricing.price_details.price`) line shapes.
    fn price_id(&self) -> Option<&str> {
        let line = self.lines.data.first()?;
        line.pointer("/price/id")
            .or_else(|| line.pointer("/pricing/price_details/price"))
            .or_else(|| line.pointer("/plan/id"))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ClerkEvent {
    #[serde(rename = "type")]
    type_: String,
    data: ClerkUser,
}

#[derive(Debug, Deserialize)]
struct ClerkUser {
    id: String,
    #[serde(default)]
    primary_email_address_id: Option<String>,
    #[serde(default)]
    email_addresses: Vec<ClerkEmail>,
}

#[derive(Debug, Deserialize)]
struct ClerkEmail {
    id: String,
    email_address: String,
}

impl ClerkUser {
    fn primary_email(&self) -> Option<String> {
        let primary = self.primary_email_address_id.as_deref();
        self.email_addresses
            .iter()
            .find(|e| Some(e.id.as_str()) == primary)
            .or_else(|| self.email_addresses.first())
            .map(|e| e.email_address.clone())
    }
}

fn parse_object<T: for<'de> Deserialize<'de>>(object: Value, what: &str) -> ReconcileResult<T> {
    serde_json::from_value(object).map_err(|e| ReconcileError::Malformed(format!("{}: {}", what, e)))
}

// ============================================================================
// Reconciler
// ============================================================================

#[derive(Clone)]
pub struct BillingReconciler {
    profiles: Arc<dyn ProfileStore>,
    ledger: CreditLedger,
    plans: PlanCatalog,
    top_up_credits: i64,
}

impl BillingReconciler {
    pub fn new(profiles: Arc<dyn ProfileStore>, plans: PlanCatalog, top_up_credits: i64) -> Self {
        let ledger = CreditLedger::new(profiles.clone());
        Self {
            profiles,
            ledger,
            plans,
            top_up_credits,
        }
    }

    /// Apply a verified Stripe event body.
    pub async fn handle_stripe(&self, body: &[u8]) -> ReconcileResult<ReconcileOutcome> {
        let event: StripeEvent =
            serde_json::from_slice(body).map_err(|e| ReconcileError::Malformed(e.to_string()))?;

        let handled = matches!(
            event.type_.as_str(),
            "checkout.session.completed"
                | "invoice.payment_succeeded"
                | "customer.subscription.updated"
                | "customer.subscription.deleted"
        );
        if !handled {
            debug!(event_id = %event.id, event_type = %event.type_, "Ignoring Stripe event");
            record_webhook_event(SOURCE_STRIPE, &event.type_, ReconcileOutcome::Ignored.as_str());
            return Ok(ReconcileOutcome::Ignored);
        }

        let event_type = event.type_.clone();
        let event_id = event.id.clone();
        self.claimed(SOURCE_STRIPE, &event_id, &event_type, self.apply_stripe(event))
            .await
    }

    /// Apply a verified Clerk (Svix) event body. `message_id` is the
    /// `svix-id` header, stable across retries of one delivery.
    pub async fn handle_identity(&self, message_id: &str, body: &[u8]) -> ReconcileResult<ReconcileOutcome> {
        let event: ClerkEvent =
            serde_json::from_slice(body).map_err(|e| ReconcileError::Malformed(e.to_string()))?;

        if event.type_ != "user.created" {
            debug!(message_id, event_type = %event.type_, "Ignoring identity event");
            record_webhook_event(SOURCE_CLERK, &event.type_, ReconcileOutcome::Ignored.as_str());
            return Ok(ReconcileOutcome::Ignored);
        }

        let event_type = event.type_.clone();
        self.claimed(SOURCE_CLERK, message_id, &event_type, self.create_profile(event.data))
            .await
    }

    /// Run `apply` under a claim on `event_id`.
    async fn claimed<F>(
        &self,
        source: &'static str,
        event_id: &str,
        event_type: &str,
        apply: F,
    ) -> ReconcileResult<ReconcileOutcome>
    where
        F: std::future::Future<Output = ReconcileResult<ReconcileOutcome>>,
    {
        if !self.profiles.claim_event(event_id, source).await? {
            info!(source, event_id, event_type, "Duplicate webhook delivery acknowledged");
            record_webhook_event(source, event_type, ReconcileOutcome::Duplicate.as_str());
            return Ok(ReconcileOutcome::Duplicate);
        }

        match apply.await {
            Ok(outcome) => {
                if let ReconcileOutcome::Skipped(reason) = &outcome {
                    warn!(source, event_id, event_type, reason = %reason, "Webhook event skipped");
                }
                record_webhook_event(source, event_type, outcome.as_str());
                Ok(outcome)
            }
            Err(e) => {
                warn!(source, event_id, event_type, error = %e, "Webhook event failed; releasing claim");
                if let Err(release) = self.profiles.release_event(event_id).await {
                    warn!(event_id, error = %release, "Failed to release webhook claim");
                }
                record_webhook_event(source, event_type, "error");
                Err(e)
            }
        }
    }

    async fn apply_stripe(&self, event: StripeEvent) -> ReconcileResult<ReconcileOutcome> {
        match event.type_.as_str() {
            "checkout.session.completed" => {
                let session: CheckoutSessionObject = parse_object(event.data.object, "checkout session")?;
                self.checkout_completed(session).await
            }
            "invoice.payment_succeeded" => {
                let invoice: InvoiceObject = parse_object(event.data.object, "invoice")?;
                self.invoice_paid(invoice).await
            }
            "customer.subscription.updated" | "customer.subscription.deleted" => {
                let subscription: SubscriptionObject = parse_object(event.data.object, "subscription")?;
                let deleted = event.type_ == "customer.subscription.deleted";
                self.subscription_changed(subscription, deleted).await
            }
            _ => Ok(ReconcileOutcome::Ignored),
        }
    }

    /// Owner of a checkout: metadata first, then the customer id.
    async fn checkout_owner(&self, session: &CheckoutSessionObject) -> ReconcileResult<Option<String>> {
        if let Some(user_id) = session.metadata.get(METADATA_USER_ID) {
            return Ok(Some(user_id.clone()));
        }
        match &session.customer {
            Some(customer) => Ok(self
                .profiles
                .get_profile_by_customer(customer)
                .await?
                .map(|p| p.id)),
            None => Ok(None),
        }
    }

    async fn checkout_completed(&self, session: CheckoutSessionObject) -> ReconcileResult<ReconcileOutcome> {
        let Some(user_id) = self.checkout_owner(&session).await? else {
            return Ok(ReconcileOutcome::Skipped("checkout has no resolvable user".into()));
        };

        match session.mode.as_deref() {
            Some("subscription") => {
                let price_id = session.metadata.get(METADATA_PRICE_ID).cloned();
                let patch = SubscriptionPatch {
                    subscription_tier: price_id.as_deref().and_then(|p| self.plans.tier_for_price(p)),
                    subscription_status: Some("active".to_string()),
                    subscription_plan_id: price_id,
                    stripe_subscription_id: session.subscription.clone(),
                };
                self.profiles.update_subscription(&user_id, &patch).await?;
                info!(
                    user_id = %user_id,
                    subscription_id = ?session.subscription,
                    plan_id = ?patch.subscription_plan_id,
                    "Subscription activated"
                );
                Ok(ReconcileOutcome::Applied)
            }
            Some("payment") if session.metadata.get(METADATA_KIND).map(String::as_str) == Some(KIND_TOP_UP) => {
                self.ledger
                    .increment(&user_id, self.top_up_credits, CreditReason::TopUp)
                    .await?;
                Ok(ReconcileOutcome::Applied)
            }
            other => Ok(ReconcileOutcome::Skipped(format!(
                "checkout mode {:?} carries no billing action",
                other
            ))),
        }
    }

    async fn invoice_paid(&self, invoice: InvoiceObject) -> ReconcileResult<ReconcileOutcome> {
        if invoice.billing_reason.as_deref() != Some("subscription_cycle") {
            return Ok(ReconcileOutcome::Skipped(format!(
                "billing reason {:?} is not a renewal",
                invoice.billing_reason
            )));
        }

        let Some(price_id) = invoice.price_id() else {
            return Ok(ReconcileOutcome::Skipped("renewal invoice has no price".into()));
        };
        let Some(credits) = self.plans.credits_for_price(price_id) else {
            return Ok(ReconcileOutcome::Skipped(format!("unknown price id '{}'", price_id)));
        };
        let Some(customer) = invoice.customer.as_deref() else {
            return Ok(ReconcileOutcome::Skipped("renewal invoice has no customer".into()));
        };
        let Some(profile) = self.profiles.get_profile_by_customer(customer).await? else {
            return Ok(ReconcileOutcome::Skipped(format!("no profile for customer '{}'", customer)));
        };

        self.ledger
            .increment(&profile.id, credits, CreditReason::Subscription)
            .await?;
        Ok(ReconcileOutcome::Applied)
    }

    async fn subscription_changed(
        &self,
        subscription: SubscriptionObject,
        deleted: bool,
    ) -> ReconcileResult<ReconcileOutcome> {
        let mut patch = SubscriptionPatch::status(subscription.status.clone());
        if deleted {
            patch.subscription_tier = Some(SubscriptionTier::Free);
        }

        let touched = self
            .profiles
            .update_subscription_by_subscription_id(&subscription.id, &patch)
            .await?;
        if touched == 0 {
            return Ok(ReconcileOutcome::Skipped(format!(
                "no profile holds subscription '{}'",
                subscription.id
            )));
        }
        info!(subscription_id = %subscription.id, status = %subscription.status, deleted, "Subscription status updated");
        Ok(ReconcileOutcome::Applied)
    }

    async fn create_profile(&self, user: ClerkUser) -> ReconcileResult<ReconcileOutcome> {
        let email = user.primary_email();
        match self.profiles.create_profile(NewProfile::signup(&user.id, email)).await {
            Ok(profile) => {
                info!(user_id = %profile.id, credits = profile.credit_balance, "Profile created");
                Ok(ReconcileOutcome::Applied)
            }
            Err(ProfileError::AlreadyExists(_)) => {
                Ok(ReconcileOutcome::Skipped(format!("profile '{}' already exists", user.id)))
            }
            Err(e) => Err(e.into()),
        }
    }
}
