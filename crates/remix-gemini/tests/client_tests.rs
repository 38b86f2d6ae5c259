//! HTTP-level tests for the Gemini client against a mock server.

use std::io::Write;

use remix_gemini::{
    ContentModel, ContentRequest, FileState, GeminiClient, GeminiConfig, GeminiError, ImageModel,
    InputPart, ModelFileStore,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Compares the whole header value; `header()` splits on commas.
struct RawHeader(&'static str, &'static str);

impl Match for RawHeader {
    fn matches(&self, request: &Request) -> bool {
        request
            .headers
            .get(self.0)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == self.1)
    }
}

fn client(server: &MockServer, models: &[&str]) -> GeminiClient {
    let config = GeminiConfig::new("test-key")
        .with_base_url(server.uri())
        .with_models(models);
    GeminiClient::new(config).unwrap()
}

fn text_response(text: &str) -> serde_json::Value {
    json!({"candidates": [{"content": {"parts": [{"text": text}]}, "finishReason": "STOP"}]})
}

#[tokio::test]
async fn test_generate_sends_json_config_and_file_part() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/m1:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": {"responseMimeType": "application/json"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("{\"ok\":true}")))
        .expect(1)
        .mount(&server)
        .await;

    let request = ContentRequest::text("analyze")
        .with_part(InputPart::file("video/mp4", "https://example.com/v.mp4"))
        .json();
    let text = client(&server, &["m1"]).generate(request).await.unwrap();
    assert_eq!(text, "{\"ok\":true}");
}

#[tokio::test]
async fn test_generate_falls_back_on_quota() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/m1:generateContent"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "exhausted", "status": "RESOURCE_EXHAUSTED"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/m2:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("from m2")))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server, &["m1", "m2"])
        .generate(ContentRequest::text("hi"))
        .await
        .unwrap();
    assert_eq!(text, "from m2");
}

#[tokio::test]
async fn test_generate_reports_quota_when_all_models_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
        .mount(&server)
        .await;

    let err = client(&server, &["m1", "m2"])
        .generate(ContentRequest::text("hi"))
        .await
        .unwrap_err();
    assert!(err.is_quota());
}

#[tokio::test]
async fn test_client_errors_do_not_fall_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/m1:generateContent"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/m2:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server, &["m1", "m2"])
        .generate(ContentRequest::text("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, GeminiError::Upstream { status: 400, .. }));
}

#[tokio::test]
async fn test_blocked_prompt_is_distinct() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"promptFeedback": {"blockReason": "SAFETY"}})),
        )
        .mount(&server)
        .await;

    let err = client(&server, &["m1"])
        .generate(ContentRequest::text("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, GeminiError::Blocked(ref r) if r == "SAFETY"));
}

#[tokio::test]
async fn test_resumable_upload_then_status_lookup() {
    let server = MockServer::start().await;
    let upload_url = format!("{}/upload-session/abc", server.uri());

    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .and(header("X-Goog-Upload-Protocol", "resumable"))
        .and(header("X-Goog-Upload-Command", "start"))
        .and(header("X-Goog-Upload-Header-Content-Length", "11"))
        .and(header("X-Goog-Upload-Header-Content-Type", "video/mp4"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-goog-upload-url", upload_url.as_str()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload-session/abc"))
        .and(RawHeader("X-Goog-Upload-Command", "upload, finalize"))
        .and(header("X-Goog-Upload-Offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file": {
                "name": "files/abc",
                "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc",
                "mimeType": "video/mp4",
                "state": "PROCESSING",
                "sizeBytes": "11"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/files/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "files/abc",
            "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc",
            "mimeType": "video/mp4",
            "state": "ACTIVE"
        })))
        .mount(&server)
        .await;

    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(b"hello video").unwrap();

    let gemini = client(&server, &["m1"]);
    let uploaded = gemini
        .upload_file(tmp.path(), "video/mp4", "clip.mp4")
        .await
        .unwrap();
    assert_eq!(uploaded.name, "files/abc");
    assert_eq!(uploaded.state, FileState::Processing);
    assert_eq!(uploaded.size_bytes, Some(11));

    let status = gemini.get_file(&uploaded.name).await.unwrap();
    assert_eq!(status.state, FileState::Active);
}

#[tokio::test]
async fn test_upload_without_session_url_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let tmp = tempfile::NamedTempFile::new().unwrap();
    let err = client(&server, &["m1"])
        .upload_file(tmp.path(), "video/mp4", "x")
        .await
        .unwrap_err();
    assert!(matches!(err, GeminiError::UploadFailed(_)));
}

#[tokio::test]
async fn test_image_prediction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/imagen-3.0-generate-002:predict"))
        .and(body_partial_json(json!({"parameters": {"sampleCount": 1}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{"bytesBase64Encoded": "iVBORw0K", "mimeType": "image/png"}]
        })))
        .mount(&server)
        .await;

    let image = client(&server, &["m1"]).generate_image("a lighthouse").await.unwrap();
    assert_eq!(image.data_url(), "data:image/png;base64,iVBORw0K");
}

#[tokio::test]
async fn test_image_prediction_without_bytes_keeps_raw_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{"raiFilteredReason": "filtered"}]
        })))
        .mount(&server)
        .await;

    let err = client(&server, &["m1"]).generate_image("x").await.unwrap_err();
    match err {
        GeminiError::NoImage { raw } => assert!(raw.contains("raiFilteredReason")),
        other => panic!("unexpected error: {other:?}"),
    }
}
