//! Webhook signature verification over the raw request body.
//!
//! Two schemes:
//! - Svix (identity provider): `svix-id`, `svix-timestamp`, `svix-signature`
//!   headers; HMAC-SHA256 over `{id}.{timestamp}.{body}` keyed by the base64
//!   part of a `whsec_` secret; signatures are space-separated `v1,<base64>`.
//! - Stripe: `Stripe-Signature: t=<ts>,v1=<hex>[,v1=<hex>]`; HMAC-SHA256 over
//!   `{t}.{body}` keyed by the raw secret.
//!
//! Comparisons go through `Mac::verify_slice` (constant time).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age (and future skew) of a signed timestamp.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),

    #[error("malformed signature header: {0}")]
    Malformed(String),

    #[error("signature timestamp outside the tolerance window")]
    TimestampOutOfRange,

    #[error("no signature matched")]
    Mismatch,

    #[error("webhook secret is invalid: {0}")]
    InvalidSecret(String),
}

/// Svix headers as received.
#[derive(Debug, Clone, Copy)]
pub struct SvixHeaders<'a> {
    pub id: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
}

fn mac_for(key: &[u8]) -> Result<HmacSha256, SignatureError> {
    HmacSha256::new_from_slice(key).map_err(|e| SignatureError::InvalidSecret(e.to_string()))
}

fn check_timestamp(raw: &str, now: i64) -> Result<(), SignatureError> {
    let ts: i64 = raw
        .trim()
        .parse()
        .map_err(|_| SignatureError::Malformed(format!("timestamp '{}'", raw)))?;
    match now.checked_sub(ts).map(i64::unsigned_abs) {
        Some(skew) if skew <= TIMESTAMP_TOLERANCE_SECS as u64 => Ok(()),
        _ => Err(SignatureError::TimestampOutOfRange),
    }
}

// ============================================================================
// Svix
// ============================================================================

pub fn verify_svix(secret: &str, headers: SvixHeaders<'_>, body: &[u8]) -> Result<(), SignatureError> {
    verify_svix_at(secret, headers, body, Utc::now().timestamp())
}

pub fn verify_svix_at(
    secret: &str,
    headers: SvixHeaders<'_>,
    body: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let id = headers.id.ok_or(SignatureError::MissingHeader("svix-id"))?;
    let timestamp = headers
        .timestamp
        .ok_or(SignatureError::MissingHeader("svix-timestamp"))?;
    let signatures = headers
        .signature
        .ok_or(SignatureError::MissingHeader("svix-signature"))?;

    check_timestamp(timestamp, now)?;

    let key = STANDARD
        .decode(secret.strip_prefix("whsec_").unwrap_or(secret))
        .map_err(|e| SignatureError::InvalidSecret(e.to_string()))?;
    let mut mac = mac_for(&key)?;
    mac.update(id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);

    let candidates: Vec<Vec<u8>> = signatures
        .split_whitespace()
        .filter_map(|entry| entry.split_once(','))
        .filter(|(version, _)| *version == "v1")
        .filter_map(|(_, sig)| STANDARD.decode(sig).ok())
        .collect();
    if candidates.is_empty() {
        return Err(SignatureError::Malformed("no v1 signature".into()));
    }

    if candidates.iter().any(|sig| mac.clone().verify_slice(sig).is_ok()) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

// ============================================================================
// Stripe
// ============================================================================

pub fn verify_stripe(secret: &str, header: Option<&str>, body: &[u8]) -> Result<(), SignatureError> {
    verify_stripe_at(secret, header, body, Utc::now().timestamp())
}

pub fn verify_stripe_at(
    secret: &str,
    header: Option<&str>,
    body: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader("Stripe-Signature"))?;

    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        if let Some(rest) = part.trim().strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.trim().strip_prefix("v1=") {
            if let Ok(sig) = hex::decode(rest) {
                candidates.push(sig);
            }
        }
    }
    let timestamp = timestamp.ok_or_else(|| SignatureError::Malformed("missing t=".into()))?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed("missing v1=".into()));
    }

    check_timestamp(timestamp, now)?;

    let mut mac = mac_for(secret.as_bytes())?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);

    if candidates.iter().any(|sig| mac.clone().verify_slice(sig).is_ok()) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Produce signature headers, for callers that need to sign test deliveries.
pub mod signing {
    use super::*;

    pub fn svix_signature(secret: &str, id: &str, timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
        let key = STANDARD
            .decode(secret.strip_prefix("whsec_").unwrap_or(secret))
            .map_err(|e| SignatureError::InvalidSecret(e.to_string()))?;
        let mut mac = mac_for(&key)?;
        mac.update(format!("{}.{}.", id, timestamp).as_bytes());
        mac.update(body);
        Ok(format!("v1,{}", STANDARD.encode(mac.finalize().into_bytes())))
    }

    pub fn stripe_signature(secret: &str, timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
        let mut mac = mac_for(secret.as_bytes())?;
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(body);
        Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::signing::*;
    use super::*;

    const SVIX_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
    const STRIPE_SECRET: &str = "whsec_stripe_test";
    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"type":"user.created","data":{"id":"user_1"}}"#;

    fn svix_headers<'a>(sig: &'a str, ts: &'a str) -> SvixHeaders<'a> {
        SvixHeaders {
            id: Some("msg_1"),
            timestamp: Some(ts),
            signature: Some(sig),
        }
    }

    #[test]
    fn test_svix_accepts_valid_signature() {
        let sig = svix_signature(SVIX_SECRET, "msg_1", NOW, BODY).unwrap();
        let ts = NOW.to_string();
        // Multiple signatures are allowed during secret rotation.
        let header = format!("v1,bm90LWl0 {}", sig);
        assert_eq!(verify_svix_at(SVIX_SECRET, svix_headers(&header, &ts), BODY, NOW), Ok(()));
    }

    #[test]
    fn test_svix_rejects_tampered_body_and_stale_timestamp() {
        let sig = svix_signature(SVIX_SECRET, "msg_1", NOW, BODY).unwrap();
        let ts = NOW.to_string();
        assert_eq!(
            verify_svix_at(SVIX_SECRET, svix_headers(&sig, &ts), b"{}", NOW),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_svix_at(SVIX_SECRET, svix_headers(&sig, &ts), BODY, NOW + 301),
            Err(SignatureError::TimestampOutOfRange)
        );
    }

    #[test]
    fn test_extreme_timestamps_are_out_of_range() {
        for ts in [i64::MIN, i64::MAX] {
            let raw = ts.to_string();
            assert_eq!(
                verify_svix_at(SVIX_SECRET, svix_headers("v1,AAAA", &raw), BODY, NOW),
                Err(SignatureError::TimestampOutOfRange)
            );
            let header = format!("t={},v1=00", raw);
            assert_eq!(
                verify_stripe_at(STRIPE_SECRET, Some(&header), BODY, NOW),
                Err(SignatureError::TimestampOutOfRange)
            );
        }
        assert_eq!(
            verify_svix_at(SVIX_SECRET, svix_headers("v1,AAAA", "0"), BODY, i64::MIN),
            Err(SignatureError::TimestampOutOfRange)
        );
    }

    #[test]
    fn test_svix_missing_headers() {
        let headers = SvixHeaders {
            id: None,
            timestamp: None,
            signature: None,
        };
        assert_eq!(
            verify_svix_at(SVIX_SECRET, headers, BODY, NOW),
            Err(SignatureError::MissingHeader("svix-id"))
        );
    }

    #[test]
    fn test_stripe_accepts_valid_signature() {
        let header = stripe_signature(STRIPE_SECRET, NOW, BODY).unwrap();
        assert_eq!(verify_stripe_at(STRIPE_SECRET, Some(&header), BODY, NOW + 10), Ok(()));
    }

    #[test]
    fn test_stripe_rejects_wrong_secret_and_malformed_header() {
        let header = stripe_signature("whsec_other", NOW, BODY).unwrap();
        assert_eq!(
            verify_stripe_at(STRIPE_SECRET, Some(&header), BODY, NOW),
            Err(SignatureError::Mismatch)
        );
        assert!(matches!(
            verify_stripe_at(STRIPE_SECRET, Some("v1=abcd"), BODY, NOW),
            Err(SignatureError::Malformed(_))
        ));
        assert_eq!(
            verify_stripe_at(STRIPE_SECRET, None, BODY, NOW),
            Err(SignatureError::MissingHeader("Stripe-Signature"))
        );
    }
}
