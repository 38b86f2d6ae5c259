//! Source video URL helpers.

use thiserror::Error;
use url::Url;

/// Errors raised while extracting a YouTube video id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum YoutubeIdError {
    #[error("URL is not a YouTube URL")]
    NotYoutube,

    #[error("YouTube URL does not contain a video id")]
    MissingId,

    #[error("YouTube video id has an invalid format")]
    InvalidId,
}

pub type YoutubeIdResult<T> = Result<T, YoutubeIdError>;

const YOUTUBE_HOSTS: &[&str] = &["youtube.com", "m.youtube.com", "music.youtube.com"];

/// Path prefixes that carry the id as the following segment.
const ID_PATH_PREFIXES: &[&str] = &["embed", "v", "shorts", "live"];

/// Extract the 11-character video id from a YouTube URL.
///
/// Accepts `watch?v=`, `youtu.be/<id>`, `/embed/`, `/v/`, `/shorts/` and `/live/`
/// forms, with or without a scheme or `www.` prefix.
pub fn extract_youtube_id(raw: &str) -> YoutubeIdResult<String> {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };
    let url = Url::parse(&with_scheme).map_err(|_| YoutubeIdError::NotYoutube)?;

    let host = url
        .host_str()
        .map(|h| h.trim_start_matches("www.").to_ascii_lowercase())
        .ok_or(YoutubeIdError::NotYoutube)?;

    let mut segments = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter();

    let candidate = if host == "youtu.be" {
        segments.next().map(str::to_string)
    } else if YOUTUBE_HOSTS.contains(&host.as_str()) {
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some(prefix) if ID_PATH_PREFIXES.contains(&prefix) => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        return Err(YoutubeIdError::NotYoutube);
    };

    match candidate {
        Some(id) if id.is_empty() => Err(YoutubeIdError::InvalidId),
        Some(id) => validate_id(id),
        None => Err(YoutubeIdError::MissingId),
    }
}

/// True when the URL points at YouTube at all (id not checked).
pub fn is_youtube_url(raw: &str) -> bool {
    !matches!(extract_youtube_id(raw), Err(YoutubeIdError::NotYoutube))
}

fn validate_id(id: String) -> YoutubeIdResult<String> {
    let well_formed = id.len() == 11
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if well_formed {
        Ok(id)
    } else {
        Err(YoutubeIdError::InvalidId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_forms() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "youtu.be/dQw4w9WgXcQ?t=30",
            "https://m.youtube.com/shorts/dQw4w9WgXcQ",
            "https://youtube.com/embed/dQw4w9WgXcQ",
            "  https://YOUTUBE.COM/v/dQw4w9WgXcQ  ",
        ] {
            assert_eq!(extract_youtube_id(url).unwrap(), "dQw4w9WgXcQ", "{}", url);
        }
    }

    #[test]
    fn test_rejects_other_hosts() {
        assert_eq!(
            extract_youtube_id("https://vimeo.com/123"),
            Err(YoutubeIdError::NotYoutube)
        );
        // Lookalike hosts must not pass a substring check.
        assert_eq!(
            extract_youtube_id("https://notyoutube.com.evil.io/watch?v=dQw4w9WgXcQ"),
            Err(YoutubeIdError::NotYoutube)
        );
        assert!(!is_youtube_url("https://example.com"));
        assert!(is_youtube_url("https://youtube.com"));
    }

    #[test]
    fn test_missing_and_invalid_ids() {
        assert_eq!(
            extract_youtube_id("https://youtube.com"),
            Err(YoutubeIdError::MissingId)
        );
        assert_eq!(
            extract_youtube_id("https://youtu.be/"),
            Err(YoutubeIdError::MissingId)
        );
        assert_eq!(
            extract_youtube_id("https://youtube.com/watch?v=abc123"),
            Err(YoutubeIdError::InvalidId)
        );
        assert_eq!(
            extract_youtube_id("https://youtube.com/watch?v="),
            Err(YoutubeIdError::InvalidId)
        );
    }
}
