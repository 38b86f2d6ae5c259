//! PostgREST connection configuration.

use std::time::Duration;

use crate::error::{ProfileError, ProfileResult};
use crate::retry::RetryConfig;

/// Configuration for the PostgREST-backed store.
#[derive(Debug, Clone)]
pub struct PostgrestConfig {
    /// Project URL; requests go to `{base_url}/rest/v1/...`.
    pub base_url: String,
    /// Service-role key, sent as both `apikey` and bearer token.
    pub service_key: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
}

impl PostgrestConfig {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> ProfileResult<Self> {
        let base_url = std::env::var("SUPABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ProfileError::config_error("SUPABASE_URL not set"))?;
        let service_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ProfileError::config_error("SUPABASE_SERVICE_ROLE_KEY not set"))?;

        let mut config = Self::new(base_url, service_key);
        config.request_timeout = Duration::from_secs(
            std::env::var("PROFILES_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        );
        config.retry = RetryConfig::from_env();
        Ok(config)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_requires_url_and_key() {
        std::env::remove_var("SUPABASE_URL");
        assert!(PostgrestConfig::from_env().is_err());

        std::env::set_var("SUPABASE_URL", "https://proj.supabase.co/");
        std::env::set_var("SUPABASE_SERVICE_ROLE_KEY", "srk");
        let config = PostgrestConfig::from_env().unwrap();
        assert_eq!(config.base_url, "https://proj.supabase.co");
        assert_eq!(config.retry.max_retries, 3);

        std::env::remove_var("SUPABASE_URL");
        std::env::remove_var("SUPABASE_SERVICE_ROLE_KEY");
    }
}
