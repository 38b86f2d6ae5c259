//! Object key construction for staged uploads.

use crate::error::{StorageError, StorageResult};

/// Every staged upload lives under this prefix.
pub const UPLOAD_PREFIX: &str = "uploads/";

const MAX_FILE_NAME_LEN: usize = 120;

/// Reduce a client-supplied file name to a safe single path segment.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_NAME_LEN)
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Key for a new upload: `uploads/{session}/{file}`.
pub fn upload_key(session: &str, file_name: &str) -> String {
    format!("{}{}/{}", UPLOAD_PREFIX, session, sanitize_file_name(file_name))
}

/// Reject keys outside the upload namespace or containing traversal segments.
pub fn validate_upload_key(key: &str) -> StorageResult<()> {
    let key = key.trim();
    if !key.starts_with(UPLOAD_PREFIX) {
        return Err(StorageError::invalid_key(format!(
            "path must start with '{}'",
            UPLOAD_PREFIX
        )));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(StorageError::invalid_key("path contains empty or relative segments"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("my clip (1).mp4"), "my_clip__1_.mp4");
        assert_eq!(sanitize_file_name(".."), "upload");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn test_upload_key_roundtrips_validation() {
        let key = upload_key("3f2c", "video.mp4");
        assert_eq!(key, "uploads/3f2c/video.mp4");
        assert!(validate_upload_key(&key).is_ok());
    }

    #[test]
    fn test_rejects_foreign_keys() {
        assert!(validate_upload_key("private/x.mp4").is_err());
        assert!(validate_upload_key("uploads/../private/x.mp4").is_err());
        assert!(validate_upload_key("uploads//x.mp4").is_err());
    }
}
