//! PostgREST-backed profile store.

use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use remix_models::{NewProfile, SubscriptionPatch, UserProfile};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, info_span, Instrument};

use crate::config::PostgrestConfig;
use crate::error::{ProfileError, ProfileResult};
use crate::metrics::record_request;
use crate::retry::with_retry;
use crate::store::ProfileStore;

const PROFILES: &str = "profiles";
const PROCESSED_EVENTS: &str = "processed_events";

/// Profile store talking to a PostgREST endpoint with the service-role key.
#[derive(Clone)]
pub struct PostgrestProfileStore {
    http: Client,
    config: PostgrestConfig,
}

impl PostgrestProfileStore {
    /// Create a new store.
    pub fn new(config: PostgrestConfig) -> ProfileResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(ProfileError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProfileResult<Self> {
        Self::new(PostgrestConfig::from_env()?)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, table)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            .header("Accept", "application/json")
    }

    /// Wrap a call with a tracing span and request metrics.
    async fn execute_request<T, F>(&self, operation: &str, subject: &str, fut: F) -> ProfileResult<T>
    where
        F: Future<Output = ProfileResult<T>>,
    {
        let span = info_span!("profile_store_request", operation = %operation, subject = %subject);

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status(),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn check(response: Response, subject: &str) -> ProfileResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(ProfileError::from_http_status(status, subject, &body))
    }

    async fn select_one(&self, column: &str, value: &str) -> ProfileResult<Option<UserProfile>> {
        let url = self.table_url(PROFILES);
        let filter = format!("eq.{}", value);
        let (url, filter) = (url.as_str(), filter.as_str());

        let rows: Vec<UserProfile> = with_retry(&self.config.retry, "select_profile", move || async move {
            let response = self
                .request(Method::GET, url)
                .query(&[("select", "*"), (column, filter), ("limit", "1")])
                .send()
                .await?;
            let response = Self::check(response, value).await?;
            Ok(response.json().await?)
        })
        .await?;

        Ok(rows.into_iter().next())
    }

    /// PATCH rows matching `column = value`; returns the updated rows.
    async fn patch_where<B: Serialize + Sync>(
        &self,
        column: &str,
        value: &str,
        body: &B,
    ) -> ProfileResult<Vec<UserProfile>> {
        let url = self.table_url(PROFILES);
        let filter = format!("eq.{}", value);
        let (url, filter) = (url.as_str(), filter.as_str());

        with_retry(&self.config.retry, "patch_profile", move || async move {
            let response = self
                .request(Method::PATCH, url)
                .query(&[(column, filter)])
                .header("Prefer", "return=representation")
                .json(body)
                .send()
                .await?;
            let response = Self::check(response, value).await?;
            Ok(response.json().await?)
        })
        .await
    }
}

#[async_trait]
impl ProfileStore for PostgrestProfileStore {
    async fn get_profile(&self, user_id: &str) -> ProfileResult<Option<UserProfile>> {
        self.execute_request("get_profile", user_id, self.select_one("id", user_id))
            .await
    }

    async fn get_profile_by_customer(
        &self,
        customer_id: &str,
    ) -> ProfileResult<Option<UserProfile>> {
        self.execute_request(
            "get_profile_by_customer",
            customer_id,
            self.select_one("stripe_customer_id", customer_id),
        )
        .await
    }

    async fn create_profile(&self, profile: NewProfile) -> ProfileResult<UserProfile> {
        let user_id = profile.id.clone();
        let fut = async {
            let response = self
                .request(Method::POST, &self.table_url(PROFILES))
                .header("Prefer", "return=representation")
                .json(&profile)
                .send()
                .await?;
            let response = Self::check(response, &user_id).await?;
            let rows: Vec<UserProfile> = response.json().await?;
            rows.into_iter()
                .next()
                .ok_or_else(|| ProfileError::InvalidResponse("insert returned no row".into()))
        };

        let row = self.execute_request("create_profile", &user_id, fut).await?;
        info!(user_id = %row.id, credits = row.credit_balance, "Created profile");
        Ok(row)
    }

    async fn adjust_credits(&self, user_id: &str, delta: i64) -> ProfileResult<i64> {
        let fut = async {
            let response = self
                .request(Method::POST, &self.table_url("rpc/adjust_credits"))
                .json(&json!({ "p_user_id": user_id, "p_delta": delta }))
                .send()
                .await?;
            let response = Self::check(response, user_id).await?;
            let balance: i64 = response.json().await?;
            Ok::<_, ProfileError>(balance)
        };

        let balance = self.execute_request("adjust_credits", user_id, fut).await?;
        debug!(user_id, delta, balance, "Adjusted credits");
        Ok(balance)
    }

    async fn update_subscription(
        &self,
        user_id: &str,
        patch: &SubscriptionPatch,
    ) -> ProfileResult<()> {
        let rows = self
            .execute_request("update_subscription", user_id, self.patch_where("id", user_id, patch))
            .await?;
        if rows.is_empty() {
            return Err(ProfileError::not_found(user_id));
        }
        Ok(())
    }

    async fn update_subscription_by_subscription_id(
        &self,
        subscription_id: &str,
        patch: &SubscriptionPatch,
    ) -> ProfileResult<u64> {
        let rows = self
            .execute_request(
                "update_subscription_by_subscription",
                subscription_id,
                self.patch_where("stripe_subscription_id", subscription_id, patch),
            )
            .await?;
        Ok(rows.len() as u64)
    }

    async fn set_customer_id(&self, user_id: &str, customer_id: &str) -> ProfileResult<()> {
        let body = json!({ "stripe_customer_id": customer_id });
        let rows = self
            .execute_request("set_customer_id", user_id, self.patch_where("id", user_id, &body))
            .await?;
        if rows.is_empty() {
            return Err(ProfileError::not_found(user_id));
        }
        Ok(())
    }

    async fn claim_event(&self, event_id: &str, source: &str) -> ProfileResult<bool> {
        let fut = async {
            let response = self
                .request(Method::POST, &self.table_url(PROCESSED_EVENTS))
                .header("Prefer", "return=minimal")
                .json(&json!({ "event_id": event_id, "source": source }))
                .send()
                .await?;
            match Self::check(response, event_id).await {
                Ok(_) => Ok(true),
                Err(ProfileError::AlreadyExists(_)) => Ok(false),
                Err(e) => Err(e),
            }
        };

        self.execute_request("claim_event", event_id, fut).await
    }

    async fn release_event(&self, event_id: &str) -> ProfileResult<()> {
        let url = self.table_url(PROCESSED_EVENTS);
        let filter = format!("eq.{}", event_id);
        let (url, filter) = (url.as_str(), filter.as_str());

        let fut = with_retry(&self.config.retry, "release_event", move || async move {
            let response = self
                .request(Method::DELETE, url)
                .query(&[("event_id", filter)])
                .send()
                .await?;
            Self::check(response, event_id).await?;
            Ok(())
        });

        self.execute_request("release_event", event_id, fut).await
    }

    async fn check_connectivity(&self) -> ProfileResult<()> {
        let response = self
            .request(Method::GET, &self.table_url(PROFILES))
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        Self::check(response, PROFILES).await?;
        Ok(())
    }
}
