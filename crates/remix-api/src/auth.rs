//! Clerk session token authentication.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::IdentityConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// JWKS cache TTL.
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600); // 1 hour

/// Minimum gap between refreshes triggered by an unknown key id.
const UNKNOWN_KID_REFRESH_GAP: Duration = Duration::from_secs(60);

/// Decoded Clerk session token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Clerk user id
    pub sub: String,
    /// Session id
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Authenticated user extracted from request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub session_id: Option<String>,
}

impl From<SessionClaims> for AuthUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            session_id: claims.sid,
        }
    }
}

/// Verifies bearer session tokens.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<SessionClaims, ApiError>;
}

/// JWKS response.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkKey>,
}

#[derive(Debug, Clone, Deserialize)]
struct JwkKey {
    kid: String,
    #[serde(default)]
    kty: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

/// RS256 verification against a cached Clerk JWKS document.
pub struct ClerkJwksVerifier {
    http: Client,
    jwks_url: String,
    issuer: Option<String>,
    keys: RwLock<HashMap<String, DecodingKey>>,
    last_refresh: RwLock<Option<Instant>>,
}

impl ClerkJwksVerifier {
    pub fn new(config: &IdentityConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::internal(format!("JWKS client: {}", e)))?;

        Ok(Self {
            http,
            jwks_url: config.jwks_url.clone(),
            issuer: config.issuer.clone(),
            keys: RwLock::new(HashMap::new()),
            last_refresh: RwLock::new(None),
        })
    }

    /// Refresh JWKS keys.
    async fn refresh_keys(&self) -> Result<(), ApiError> {
        debug!(url = %self.jwks_url, "Refreshing JWKS keys");
        // Stamp first so a failing endpoint is not hammered.
        *self.last_refresh.write().await = Some(Instant::now());

        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::internal(format!("JWKS fetch failed: {}", e)))?;
        let jwks: JwksResponse = response
            .json()
            .await
            .map_err(|e| ApiError::internal(format!("JWKS decode failed: {}", e)))?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            if jwk.kty.as_deref().is_some_and(|k| k != "RSA") {
                continue;
            }
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                continue;
            };
            match DecodingKey::from_rsa_components(n, e) {
                Ok(key) => {
                    keys.insert(jwk.kid, key);
                }
                Err(err) => warn!(kid = %jwk.kid, error = %err, "Skipping unusable JWK"),
            }
        }

        let key_count = keys.len();
        *self.keys.write().await = keys;
        debug!("Refreshed {} JWKS keys", key_count);
        Ok(())
    }

    async fn since_refresh(&self) -> Option<Duration> {
        self.last_refresh.read().await.map(|t| t.elapsed())
    }

    /// Get decoding key for a key ID.
    async fn get_key(&self, kid: &str) -> Option<DecodingKey> {
        let stale = self.since_refresh().await.map_or(true, |age| age > JWKS_CACHE_TTL);
        if stale {
            if let Err(e) = self.refresh_keys().await {
                warn!("Failed to refresh JWKS keys: {}", e);
            }
        }

        if let Some(key) = self.keys.read().await.get(kid).cloned() {
            return Some(key);
        }

        // Signing key rotation: allow an early refresh, at most once a minute.
        let may_retry = self
            .since_refresh()
            .await
            .map_or(true, |age| age > UNKNOWN_KID_REFRESH_GAP);
        if may_retry {
            if let Err(e) = self.refresh_keys().await {
                warn!("Failed to refresh JWKS keys: {}", e);
            }
            return self.keys.read().await.get(kid).cloned();
        }
        None
    }
}

#[async_trait]
impl SessionVerifier for ClerkJwksVerifier {
    async fn verify(&self, token: &str) -> Result<SessionClaims, ApiError> {
        // Decode header to get key ID
        let header = decode_header(token)
            .map_err(|e| ApiError::unauthorized(format!("Invalid token header: {}", e)))?;

        let kid = header
            .kid
            .ok_or_else(|| ApiError::unauthorized("Token missing key ID"))?;

        let key = self
            .get_key(&kid)
            .await
            .ok_or_else(|| ApiError::unauthorized("Unknown key ID"))?;

        // Clerk session tokens carry no audience.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        let token_data = decode::<SessionClaims>(token, &key, &validation)
            .map_err(|e| ApiError::unauthorized(format!("Token validation failed: {}", e)))?;

        Ok(token_data.claims)
    }
}

/// Axum extractor for authenticated user.
#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        let claims = state.sessions.verify(token.trim()).await?;

        Ok(AuthUser::from(claims))
    }
}
