//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

use remix_models::PlanCatalog;
use thiserror::Error;

/// Credits granted by one top-up purchase unless `TOP_UP_CREDITS` overrides it.
pub const DEFAULT_TOP_UP_CREDITS: i64 = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {message}")]
    Invalid { var: &'static str, message: String },
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn optional(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second (per client IP)
    pub rate_limit_rps: u32,
    /// Request timeout for ordinary routes
    pub request_timeout: Duration,
    /// Max request body size for JSON routes
    pub max_body_size: usize,
    /// Max body size for media uploads (multipart)
    pub max_upload_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Ingestion poll bounds
    pub poll: PollPolicy,
    /// Directory for transient media copies
    pub temp_dir: PathBuf,
    /// YouTube Data API key for duration lookups
    pub youtube_api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024, // 10MB
            max_upload_size: 512 * 1024 * 1024,
            environment: "development".to_string(),
            poll: PollPolicy::default(),
            temp_dir: std::env::temp_dir(),
            youtube_api_key: None,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: optional("API_HOST").unwrap_or(defaults.host),
            port: parsed("API_PORT", defaults.port),
            cors_origins: optional("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: parsed("RATE_LIMIT_RPS", defaults.rate_limit_rps),
            request_timeout: Duration::from_secs(parsed("REQUEST_TIMEOUT", 30)),
            max_body_size: parsed("MAX_BODY_SIZE", defaults.max_body_size),
            max_upload_size: parsed("MAX_UPLOAD_SIZE", defaults.max_upload_size),
            environment: optional("ENVIRONMENT").unwrap_or(defaults.environment),
            poll: PollPolicy::from_env(),
            temp_dir: optional("INGEST_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            youtube_api_key: optional("YOUTUBE_API_KEY"),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

// ============================================================================
// Ingestion polling
// ============================================================================

/// Bounds for the file-store readiness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between status checks.
    pub interval: Duration,
    /// Maximum number of status checks.
    pub max_polls: u32,
    /// Wall-clock ceiling for the whole poll loop.
    pub deadline: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_polls: 60,
            deadline: Duration::from_secs(300),
        }
    }
}

impl PollPolicy {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval: Duration::from_secs(parsed("INGEST_POLL_INTERVAL_SECS", 5)),
            max_polls: parsed("INGEST_MAX_POLLS", defaults.max_polls).max(1),
            deadline: Duration::from_secs(parsed("INGEST_DEADLINE_SECS", 300)),
        }
    }
}

// ============================================================================
// Identity provider
// ============================================================================

/// Clerk session verification and webhook settings.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// JWKS document used to verify session tokens.
    pub jwks_url: String,
    /// Expected `iss` claim; unchecked when absent.
    pub issuer: Option<String>,
    /// Svix signing secret (`whsec_...`).
    pub webhook_secret: String,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            jwks_url: required("CLERK_JWKS_URL")?,
            issuer: optional("CLERK_ISSUER"),
            webhook_secret: required("CLERK_WEBHOOK_SECRET")?,
        })
    }
}

// ============================================================================
// Billing
// ============================================================================

/// Stripe settings and the price catalog.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
    /// Frontend origin used for checkout and portal return URLs.
    pub app_base_url: String,
    pub top_up_price_id: Option<String>,
    pub top_up_credits: i64,
    pub plans: PlanCatalog,
}

impl BillingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let plans = match optional("STRIPE_PLANS") {
            Some(spec) => PlanCatalog::parse(&spec).map_err(|e| ConfigError::Invalid {
                var: "STRIPE_PLANS",
                message: e.to_string(),
            })?,
            None => PlanCatalog::default(),
        };

        let top_up_credits = parsed("TOP_UP_CREDITS", DEFAULT_TOP_UP_CREDITS);
        if top_up_credits <= 0 {
            return Err(ConfigError::Invalid {
                var: "TOP_UP_CREDITS",
                message: "must be positive".to_string(),
            });
        }

        Ok(Self {
            secret_key: required("STRIPE_SECRET_KEY")?,
            webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            api_base: optional("STRIPE_API_BASE")
                .unwrap_or_else(|| "https://api.stripe.com".to_string()),
            app_base_url: optional("APP_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            top_up_price_id: optional("STRIPE_TOP_UP_PRICE_ID"),
            top_up_credits,
            plans,
        })
    }
}
