//! Minimal Stripe client over reqwest (form-encoded REST).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use thiserror::Error;
use tracing::error;

pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Stripe request failed: {context} (status {status})")]
    Api { context: &'static str, status: u16, message: Option<String> },

    #[error("Stripe response invalid: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Checkout mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    Subscription,
    Payment,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Subscription => "subscription",
            CheckoutMode::Payment => "payment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub price_id: String,
    pub mode: CheckoutMode,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Payment provider operations used by the billing service.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer and return its id.
    async fn create_customer(&self, user_id: &str, email: Option<&str>) -> BillingResult<String>;

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> BillingResult<CheckoutSession>;

    /// Create a billing portal session and return its URL.
    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> BillingResult<String>;
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>) -> BillingResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            secret_key: secret_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
        context: &'static str,
    ) -> BillingResult<T> {
        let resp = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .form(form)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, context).await?;
        resp.json::<T>()
            .await
            .map_err(|e| BillingError::InvalidResponse(format!("{}: {}", context, e)))
    }

    async fn ensure_success(resp: reqwest::Response, context: &'static str) -> BillingResult<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let body = resp.text().await.unwrap_or_default();

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);
        let message = details.as_ref().and_then(|d| d.message.clone());

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_message = ?message,
            context,
            "Stripe API request failed"
        );

        Err(BillingError::Api {
            context,
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_customer(&self, user_id: &str, email: Option<&str>) -> BillingResult<String> {
        #[derive(Deserialize)]
        struct CustomerResp {
            id: String,
        }

        let mut form = vec![("metadata[user_id]".to_string(), user_id.to_string())];
        if let Some(email) = email {
            form.push(("email".to_string(), email.to_string()));
        }
        let parsed: CustomerResp = self.post_form("/v1/customers", &form, "create customer").await?;
        Ok(parsed.id)
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> BillingResult<CheckoutSession> {
        let mut form = vec![
            ("mode".to_string(), request.mode.as_str().to_string()),
            ("customer".to_string(), request.customer_id.clone()),
            ("line_items[0][price]".to_string(), request.price_id.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }
        self.post_form("/v1/checkout/sessions", &form, "create checkout session")
            .await
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> BillingResult<String> {
        #[derive(Deserialize)]
        struct PortalResp {
            url: String,
        }

        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];
        let parsed: PortalResp = self
            .post_form("/v1/billing_portal/sessions", &form, "create portal session")
            .await?;
        Ok(parsed.url)
    }
}
