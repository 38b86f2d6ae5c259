//! Video duration lookup via the YouTube Data API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Video not found: {0}")]
    NotFound(String),

    #[error("Unparseable duration '{0}'")]
    InvalidDuration(String),

    #[error("YouTube API returned {status}")]
    Api { status: u16 },

    #[error("Video metadata lookup is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Duration lookup for a platform video id.
#[async_trait]
pub trait VideoMetadata: Send + Sync {
    async fn duration_secs(&self, video_id: &str) -> Result<u64, MetadataError>;
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

#[derive(Clone)]
pub struct YoutubeClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl YoutubeClient {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Result<Self, MetadataError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl VideoMetadata for YoutubeClient {
    async fn duration_secs(&self, video_id: &str) -> Result<u64, MetadataError> {
        let api_key = self.api_key.as_deref().ok_or(MetadataError::NotConfigured)?;

        let response = self
            .http
            .get(format!("{}/videos", self.base_url))
            .query(&[("part", "contentDetails"), ("id", video_id), ("key", api_key)])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            warn!(video_id, status, "YouTube API request failed");
            return Err(MetadataError::Api { status });
        }

        let list: VideoListResponse = response.json().await?;
        let item = list
            .items
            .into_iter()
            .next()
            .ok_or_else(|| MetadataError::NotFound(video_id.to_string()))?;

        let raw = item.content_details.duration;
        let secs = parse_iso8601_duration(&raw).ok_or(MetadataError::InvalidDuration(raw))?;
        debug!(video_id, secs, "Resolved video duration");
        Ok(secs)
    }
}

/// Parse an ISO-8601 duration (`PT1H2M3S`, `P1DT2H`, `P0D`) into seconds.
///
/// Years and months are rejected; YouTube never emits them.
pub fn parse_iso8601_duration(raw: &str) -> Option<u64> {
    let rest = raw.trim().strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }

    let mut total: u64 = 0;
    let mut in_time = false;
    let mut digits = String::new();
    let mut saw_unit = false;

    for c in rest.chars() {
        match c {
            'T' if !in_time && digits.is_empty() => in_time = true,
            '0'..='9' => digits.push(c),
            unit => {
                let value: u64 = digits.parse().ok()?;
                digits.clear();
                let scale = match (in_time, unit) {
                    (false, 'W') => 7 * 86_400,
                    (false, 'D') => 86_400,
                    (true, 'H') => 3_600,
                    (true, 'M') => 60,
                    (true, 'S') => 1,
                    _ => return None,
                };
                total = total.checked_add(value.checked_mul(scale)?)?;
                saw_unit = true;
            }
        }
    }

    if !digits.is_empty() || !saw_unit {
        return None;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_durations() {
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), Some(3_723));
        assert_eq!(parse_iso8601_duration("PT45S"), Some(45));
        assert_eq!(parse_iso8601_duration("PT10M"), Some(600));
        assert_eq!(parse_iso8601_duration("P1DT1S"), Some(86_401));
        assert_eq!(parse_iso8601_duration("P0D"), Some(0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "P", "PT", "1H", "PT1X", "P1M", "PT5", "PTT1S"] {
            assert_eq!(parse_iso8601_duration(bad), None, "{}", bad);
        }
    }

    #[tokio::test]
    async fn test_duration_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("id", "dQw4w9WgXcQ"))
            .and(query_param("part", "contentDetails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"contentDetails": {"duration": "PT3M33S"}}]
            })))
            .mount(&server)
            .await;

        let client = YoutubeClient::new(Some("key".into()), server.uri()).unwrap();
        assert_eq!(client.duration_secs("dQw4w9WgXcQ").await.unwrap(), 213);
    }

    #[tokio::test]
    async fn test_missing_video_and_missing_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .mount(&server)
            .await;

        let client = YoutubeClient::new(Some("key".into()), server.uri()).unwrap();
        assert!(matches!(
            client.duration_secs("aaaaaaaaaaa").await,
            Err(MetadataError::NotFound(_))
        ));

        let unconfigured = YoutubeClient::new(None, server.uri()).unwrap();
        assert!(matches!(
            unconfigured.duration_secs("aaaaaaaaaaa").await,
            Err(MetadataError::NotConfigured)
        ));
    }
}
