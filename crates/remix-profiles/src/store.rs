//! Profile store abstraction.

use async_trait::async_trait;
use remix_models::{NewProfile, SubscriptionPatch, UserProfile};

use crate::error::ProfileResult;

/// Persistence for user profiles, credit balances and processed webhook events.
///
/// `adjust_credits` must be a single atomic conditional update at the storage
/// layer; callers never read-modify-write a balance.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> ProfileResult<Option<UserProfile>>;

    /// Look up the profile owning a billing customer id.
    async fn get_profile_by_customer(&self, customer_id: &str)
        -> ProfileResult<Option<UserProfile>>;

    /// Insert a profile. Fails with `AlreadyExists` if the id is taken.
    async fn create_profile(&self, profile: NewProfile) -> ProfileResult<UserProfile>;

    /// Add `delta` to the balance and return the new balance.
    ///
    /// Fails with `InsufficientCredits` (and changes nothing) when the result
    /// would be negative, and with `NotFound` when the profile is missing.
    async fn adjust_credits(&self, user_id: &str, delta: i64) -> ProfileResult<i64>;

    /// Patch subscription columns of one profile.
    async fn update_subscription(&self, user_id: &str, patch: &SubscriptionPatch)
        -> ProfileResult<()>;

    /// Patch every profile carrying `subscription_id`; returns the number of rows touched.
    async fn update_subscription_by_subscription_id(
        &self,
        subscription_id: &str,
        patch: &SubscriptionPatch,
    ) -> ProfileResult<u64>;

    async fn set_customer_id(&self, user_id: &str, customer_id: &str) -> ProfileResult<()>;

    /// Record `event_id` as processed. Returns `false` if it was already claimed.
    async fn claim_event(&self, event_id: &str, source: &str) -> ProfileResult<bool>;

    /// Drop a claim so a redelivery of the event is processed again.
    async fn release_event(&self, event_id: &str) -> ProfileResult<()>;

    /// Readiness probe.
    async fn check_connectivity(&self) -> ProfileResult<()>;
}
