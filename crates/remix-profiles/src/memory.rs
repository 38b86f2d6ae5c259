//! In-process profile store.
//!
//! All state sits behind one mutex, so every operation (including
//! `adjust_credits`) is atomic with respect to the others. Used for local
//! development and tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use remix_models::{NewProfile, SubscriptionPatch, UserProfile};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ProfileError, ProfileResult};
use crate::store::ProfileStore;

#[derive(Default)]
struct State {
    profiles: HashMap<String, UserProfile>,
    events: HashSet<String>,
}

/// Mutex-guarded in-memory store.
#[derive(Default)]
pub struct MemoryProfileStore {
    state: Mutex<State>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a profile directly, replacing any existing row.
    pub async fn insert(&self, profile: UserProfile) {
        self.state
            .lock()
            .await
            .profiles
            .insert(profile.id.clone(), profile);
    }

    pub async fn profile_count(&self) -> usize {
        self.state.lock().await.profiles.len()
    }

    pub async fn is_claimed(&self, event_id: &str) -> bool {
        self.state.lock().await.events.contains(event_id)
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get_profile(&self, user_id: &str) -> ProfileResult<Option<UserProfile>> {
        Ok(self.state.lock().await.profiles.get(user_id).cloned())
    }

    async fn get_profile_by_customer(
        &self,
        customer_id: &str,
    ) -> ProfileResult<Option<UserProfile>> {
        Ok(self
            .state
            .lock()
            .await
            .profiles
            .values()
            .find(|p| p.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn create_profile(&self, profile: NewProfile) -> ProfileResult<UserProfile> {
        let mut state = self.state.lock().await;
        if state.profiles.contains_key(&profile.id) {
            return Err(ProfileError::AlreadyExists(profile.id));
        }
        let row = profile.into_profile(Utc::now());
        state.profiles.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn adjust_credits(&self, user_id: &str, delta: i64) -> ProfileResult<i64> {
        let mut state = self.state.lock().await;
        let profile = state
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| ProfileError::not_found(user_id))?;

        let next = profile.credit_balance + delta;
        if next < 0 {
            return Err(ProfileError::InsufficientCredits(user_id.to_string()));
        }
        profile.credit_balance = next;
        debug!(user_id, delta, balance = next, "Adjusted credits in memory");
        Ok(next)
    }

    async fn update_subscription(
        &self,
        user_id: &str,
        patch: &SubscriptionPatch,
    ) -> ProfileResult<()> {
        let mut state = self.state.lock().await;
        let profile = state
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| ProfileError::not_found(user_id))?;
        patch.apply_to(profile);
        Ok(())
    }

    async fn update_subscription_by_subscription_id(
        &self,
        subscription_id: &str,
        patch: &SubscriptionPatch,
    ) -> ProfileResult<u64> {
        let mut state = self.state.lock().await;
        let mut touched = 0;
        for profile in state
            .profiles
            .values_mut()
            .filter(|p| p.stripe_subscription_id.as_deref() == Some(subscription_id))
        {
            patch.apply_to(profile);
            touched += 1;
        }
        Ok(touched)
    }

    async fn set_customer_id(&self, user_id: &str, customer_id: &str) -> ProfileResult<()> {
        let mut state = self.state.lock().await;
        let profile = state
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| ProfileError::not_found(user_id))?;
        profile.stripe_customer_id = Some(customer_id.to_string());
        Ok(())
    }

    async fn claim_event(&self, event_id: &str, _source: &str) -> ProfileResult<bool> {
        Ok(self.state.lock().await.events.insert(event_id.to_string()))
    }

    async fn release_event(&self, event_id: &str) -> ProfileResult<()> {
        self.state.lock().await.events.remove(event_id);
        Ok(())
    }

    async fn check_connectivity(&self) -> ProfileResult<()> {
        Ok(())
    }
}
