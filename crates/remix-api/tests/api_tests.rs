//! End-to-end router tests against in-process fakes.

mod common;

use axum::body::Body;
use axum::http::Request;
use common::*;
use remix_api::services::signatures::signing;
use remix_models::SubscriptionTier;
use remix_profiles::ProfileStore;
use remix_storage::upload_key;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_FILE: &str = "https://generativelanguage.googleapis.com/v1beta/files/abc123";

fn video_analysis() -> String {
    json!({
        "meta": {"primary_tone": "Energetic", "duration_estimate": "45s"},
        "hook_analysis": {"technique": "question", "first_line": "Ever wondered why?"},
        "retention_signals": {"pacing": "fast cuts"},
        "engagement_tactics": {"call_to_action": "follow for part two"}
    })
    .to_string()
}

fn image_analysis() -> Value {
    json!({
        "subjects": ["a red bicycle"],
        "setting": "rainy street at dusk",
        "style_elements": {"palette": "neon", "lighting": "backlit"}
    })
}

// ============================================================================
// Health and auth
// ============================================================================

#[tokio::test]
async fn test_health_and_ready() {
    let app = TestAppBuilder::new().build().await;

    let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = app.send(health).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");

    let ready = Request::builder().uri("/ready").body(Body::empty()).unwrap();
    let (status, _) = app.send(ready).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_api_requires_session() {
    let app = TestAppBuilder::new().build().await;

    let missing = Request::builder().uri("/api/profile").body(Body::empty()).unwrap();
    let (status, body) = app.send(missing).await;
    assert_eq!(status, 401);
    assert!(body["error"].is_string());

    let bad = Request::builder()
        .uri("/api/profile")
        .header("authorization", "Bearer forged")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(bad).await;
    assert_eq!(status, 401);
}

// ============================================================================
// Profile and credits
// ============================================================================

#[tokio::test]
async fn test_profile_returns_balance() {
    let app = TestAppBuilder::new().build().await;
    app.seed_profile(USER, 7, SubscriptionTier::Pro).await;

    let (status, body) = app.send(authed_get("/api/profile", USER)).await;
    assert_eq!(status, 200);
    assert_eq!(body["id"], USER);
    assert_eq!(body["credit_balance"], 7);
    assert_eq!(body["subscription_tier"], "pro");
}

#[tokio::test]
async fn test_concurrent_decrements_never_go_negative() {
    let app = TestAppBuilder::new().build().await;
    app.seed_profile(USER, 1, SubscriptionTier::Free).await;

    let first = app.send(authed_json("/api/credits/decrement", USER, json!({})));
    let second = app.send(authed_json("/api/credits/decrement", USER, json!({})));
    let ((a, _), (b, _)) = tokio::join!(first, second);

    let mut statuses = vec![a, b];
    statuses.sort();
    assert_eq!(statuses, vec![200, 402]);

    let profile = app.profiles.get_profile(USER).await.unwrap().unwrap();
    assert_eq!(profile.credit_balance, 0);
}

// ============================================================================
// Storage and ingestion
// ============================================================================

#[tokio::test]
async fn test_create_signed_url() {
    let app = TestAppBuilder::new().build().await;

    let (status, body) = app
        .send(authed_json(
            "/api/create-signed-url",
            USER,
            json!({"fileName": "my clip.mp4", "contentType": "video/mp4"}),
        ))
        .await;
    assert_eq!(status, 200);
    assert!(body["signedUrl"].as_str().unwrap().starts_with("https://"));
    assert!(body["path"].as_str().unwrap().starts_with("uploads/"));
    assert_eq!(body["token"], "session-1");
}

#[tokio::test]
async fn test_create_signed_url_requires_content_type() {
    let app = TestAppBuilder::new().build().await;

    let (status, body) = app
        .send(authed_json("/api/create-signed-url", USER, json!({"fileName": "a.mp4"})))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "contentType is required");
}

#[tokio::test]
async fn test_transfer_streams_staged_object() {
    let server = MockServer::start().await;
    let key = upload_key("session-1", "clip.mp4");
    Mock::given(method("GET"))
        .and(path(format!("/{}", key)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
        .expect(1)
        .mount(&server)
        .await;

    let app = TestAppBuilder::new().download_base(server.uri()).build().await;
    let (status, body) = app
        .send(authed_json(
            "/api/transfer-to-gemini",
            USER,
            json!({"filePath": key, "mimeType": "video/mp4"}),
        ))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["fileUri"], MODEL_FILE);
    assert_eq!(body["mimeType"], "video/mp4");
    assert_eq!(app.files.uploaded.lock().await[0].1, 4096);
    assert_eq!(app.temp_files(), 0);
}

#[tokio::test]
async fn test_transfer_rejects_foreign_path() {
    let app = TestAppBuilder::new().build().await;

    let (status, _) = app
        .send(authed_json(
            "/api/transfer-to-gemini",
            USER,
            json!({"filePath": "private/other-user/clip.mp4", "mimeType": "video/mp4"}),
        ))
        .await;
    assert_eq!(status, 400);
    assert!(app.files.uploaded.lock().await.is_empty());
}

#[tokio::test]
async fn test_upload_video_multipart() {
    let app = TestAppBuilder::new().build().await;
    let bytes = vec![1u8; 10_000];

    let body = multipart_body(Some(("clip.mp4", "video/mp4", &bytes)), &[]);
    let (status, body) = app.send(authed_multipart("/api/upload-video", USER, body)).await;

    assert_eq!(status, 200);
    assert_eq!(body["fileUri"], MODEL_FILE);
    let uploaded = app.files.uploaded.lock().await;
    assert_eq!(uploaded[0], ("clip.mp4".to_string(), 10_000));
    assert_eq!(app.temp_files(), 0);
}

#[tokio::test]
async fn test_upload_video_without_file() {
    let app = TestAppBuilder::new().build().await;

    let body = multipart_body(None, &[("topic", "cats")]);
    let (status, body) = app.send(authed_multipart("/api/upload-video", USER, body)).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "file is required");
}

// ============================================================================
// Video pipeline
// ============================================================================

#[tokio::test]
async fn test_generate_script() {
    let model = CannedModel {
        analysis: format!("```json\n{}\n```", video_analysis()),
        text: "[VISUAL: close-up of a kettle] Ever wondered why tea tastes better abroad?".to_string(),
        ..CannedModel::default()
    };
    let app = TestAppBuilder::new().model(model).build().await;

    let (status, body) = app
        .send(authed_json(
            "/api/generate",
            USER,
            json!({
                "topic": "Why tea tastes different",
                "outputType": "Script",
                "outputDetail": "Short Form",
                "videoSource": MODEL_FILE,
                "mimeType": "video/mp4"
            }),
        ))
        .await;

    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["result"]["analysis"]["meta"]["primary_tone"], "Energetic");
    assert!(body["result"]["content"]
        .as_str()
        .unwrap()
        .starts_with("[VISUAL:"));
    assert_eq!(app.model.file_parts().await, vec![MODEL_FILE.to_string()]);
}

#[tokio::test]
async fn test_generate_quota_exhaustion_is_429() {
    let model = CannedModel {
        exhausted: true,
        ..CannedModel::default()
    };
    let app = TestAppBuilder::new().model(model).build().await;

    let (status, body) = app
        .send(authed_json(
            "/api/generate",
            USER,
            json!({
                "topic": "tea",
                "outputType": "Script",
                "videoSource": MODEL_FILE,
                "mimeType": "video/mp4"
            }),
        ))
        .await;
    assert_eq!(status, 429);
    assert!(!body["error"].as_str().unwrap().contains("RESOURCE_EXHAUSTED"));
}

#[tokio::test]
async fn test_generate_requires_topic() {
    let app = TestAppBuilder::new().build().await;

    let (status, body) = app
        .send(authed_json(
            "/api/generate",
            USER,
            json!({"outputType": "Script", "videoSource": MODEL_FILE, "mimeType": "video/mp4"}),
        ))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"error": "topic is required"}));
    assert!(app.model.requests.lock().await.is_empty());
}

#[tokio::test]
async fn test_generate_rejects_internal_media_url() {
    let app = TestAppBuilder::new().build().await;

    let (status, _) = app
        .send(authed_json(
            "/api/analyze",
            USER,
            json!({"videoSource": "http://169.254.169.254/latest/meta-data", "mimeType": "video/mp4"}),
        ))
        .await;
    assert_eq!(status, 400);
    assert!(app.model.requests.lock().await.is_empty());
}

#[tokio::test]
async fn test_generate_content_scene_prompts() {
    let model = CannedModel {
        text: "Sure! [\"Wide shot of a misty tea field\", \"Macro of leaves unfurling\", \"Steam rising from a cup\"]"
            .to_string(),
        ..CannedModel::default()
    };
    let app = TestAppBuilder::new().model(model).build().await;

    let analysis: Value = serde_json::from_str(&video_analysis()).unwrap();
    let (status, body) = app
        .send(authed_json(
            "/api/generate-content",
            USER,
            json!({
                "topic": "tea harvest",
                "outputType": "AI Video Prompts",
                "outputDetail": "Short Form",
                "analysis": analysis
            }),
        ))
        .await;

    assert_eq!(status, 200, "{}", body);
    let scenes = body["content"].as_array().unwrap();
    assert_eq!(scenes.len(), 3);
    assert_eq!(scenes[0], "Wide shot of a misty tea field");
}

#[tokio::test]
async fn test_generate_content_rejects_unknown_output_type() {
    let app = TestAppBuilder::new().build().await;

    let (status, _) = app
        .send(authed_json(
            "/api/generate-content",
            USER,
            json!({"topic": "tea", "outputType": "Podcast", "analysis": {"meta": {}}}),
        ))
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_video_duration() {
    let app = TestAppBuilder::new().build().await;

    let (status, body) = app
        .send(authed_json(
            "/api/get-video-duration",
            USER,
            json!({"videoUrl": "https://www.youtube.com/watch?v=dQw4w9WgXcQ"}),
        ))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["duration"], 213);

    let (status, body) = app
        .send(authed_json(
            "/api/get-video-duration",
            USER,
            json!({"videoUrl": "https://vimeo.com/123456"}),
        ))
        .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid YouTube URL"));
}

// ============================================================================
// Image pipeline
// ============================================================================

#[tokio::test]
async fn test_analyze_image_multipart() {
    let model = CannedModel {
        analysis: image_analysis().to_string(),
        ..CannedModel::default()
    };
    let app = TestAppBuilder::new().model(model).build().await;

    let body = multipart_body(Some(("bike.jpg", "image/jpeg", b"\xff\xd8\xff")), &[]);
    let (status, body) = app.send(authed_multipart("/api/analyze-image", USER, body)).await;

    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["analysis"]["setting"], "rainy street at dusk");
}

#[tokio::test]
async fn test_generate_image_content_json() {
    let model = CannedModel {
        structured: json!({
            "linkedin": "Commuting, reimagined.",
            "twitter": "Rain can't stop us #bike",
            "instagram": "Neon nights on two wheels #cycling"
        })
        .to_string(),
        text: "Neon-lit cinematic photography, wet reflections, backlit".to_string(),
        ..CannedModel::default()
    };
    let app = TestAppBuilder::new().model(model).build().await;

    let (status, body) = app
        .send(authed_json(
            "/api/generate-image-content",
            USER,
            json!({
                "analysis": image_analysis(),
                "topic": "Urban cycling",
                "styleInfluence": 80
            }),
        ))
        .await;

    assert_eq!(status, 200, "{}", body);
    let result = &body["result"];
    assert!(result["imageUrl"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
    assert_eq!(result["posts"]["twitter"], "Rain can't stop us #bike");
    assert!(result["headline"].is_null());
}

#[tokio::test]
async fn test_generate_image_content_blocked_image_is_422() {
    let model = CannedModel {
        structured: json!({"linkedin": "a", "twitter": "b", "instagram": "c"}).to_string(),
        text: "style".to_string(),
        ..CannedModel::default()
    };
    let app = TestAppBuilder::new()
        .model(model)
        .images(FakeImages { blocked: true })
        .build()
        .await;

    let body = multipart_body(
        None,
        &[
            ("analysis", &image_analysis().to_string()),
            ("topic", "Urban cycling"),
            ("includeText", "false"),
        ],
    );
    let (status, _) = app
        .send(authed_multipart("/api/generate-image-content", USER, body))
        .await;
    assert_eq!(status, 422);
}

// ============================================================================
// Billing
// ============================================================================

#[tokio::test]
async fn test_checkout_session_for_plan() {
    let app = TestAppBuilder::new().build().await;
    app.seed_profile(USER, 3, SubscriptionTier::Free).await;

    let (status, body) = app
        .send(authed_json(
            "/api/create-checkout-session",
            USER,
            json!({"priceId": PRO_PRICE}),
        ))
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["sessionId"], "cs_test_1");

    let checkouts = app.payments.checkouts.lock().await;
    assert_eq!(checkouts[0].price_id, PRO_PRICE);
    assert_eq!(checkouts[0].customer_id, "cus_new");
}

#[tokio::test]
async fn test_checkout_for_another_user_is_forbidden() {
    let app = TestAppBuilder::new().build().await;
    app.seed_profile(USER, 3, SubscriptionTier::Free).await;

    let (status, _) = app
        .send(authed_json(
            "/api/create-checkout-session",
            USER,
            json!({"userId": "user_other", "priceId": PRO_PRICE}),
        ))
        .await;
    assert_eq!(status, 403);
    assert!(app.payments.checkouts.lock().await.is_empty());
}

#[tokio::test]
async fn test_top_up_requires_paid_tier() {
    let app = TestAppBuilder::new().build().await;
    app.seed_profile(USER, 3, SubscriptionTier::Free).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/create-top-up-checkout-session")
        .header("authorization", format!("Bearer valid-{}", USER))
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, 403);
}

// ============================================================================
// Webhooks
// ============================================================================

fn top_up_event(event_id: &str) -> Value {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": "cs_test_1",
            "mode": "payment",
            "customer": "cus_1",
            "metadata": {"user_id": USER, "kind": "top_up"}
        }}
    })
}

fn stripe_header(body: &Value) -> String {
    let raw = body.to_string();
    signing::stripe_signature(STRIPE_SECRET, unix_now(), raw.as_bytes()).unwrap()
}

#[tokio::test]
async fn test_stripe_top_up_applies_once() {
    let app = TestAppBuilder::new().build().await;
    app.seed_profile(USER, 10, SubscriptionTier::Pro).await;

    let event = top_up_event("evt_top_up_1");
    let (status, body) = app.send(stripe_request(&event, &stripe_header(&event))).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"received": true}));

    // Provider redelivery with a fresh signature.
    let (status, _) = app.send(stripe_request(&event, &stripe_header(&event))).await;
    assert_eq!(status, 200);

    let profile = app.profiles.get_profile(USER).await.unwrap().unwrap();
    assert_eq!(profile.credit_balance, 60);
    assert!(app.profiles.is_claimed("evt_top_up_1").await);
}

#[tokio::test]
async fn test_stripe_invalid_signature_mutates_nothing() {
    let app = TestAppBuilder::new().build().await;
    app.seed_profile(USER, 10, SubscriptionTier::Pro).await;

    let event = top_up_event("evt_forged");
    let forged = signing::stripe_signature("whsec_wrong", unix_now(), event.to_string().as_bytes()).unwrap();
    let (status, _) = app.send(stripe_request(&event, &forged)).await;
    assert_eq!(status, 400);

    let profile = app.profiles.get_profile(USER).await.unwrap().unwrap();
    assert_eq!(profile.credit_balance, 10);
    assert!(!app.profiles.is_claimed("evt_forged").await);
}

#[tokio::test]
async fn test_clerk_user_created_provisions_profile() {
    let app = TestAppBuilder::new().build().await;

    let event = json!({
        "type": "user.created",
        "data": {
            "id": "user_new",
            "primary_email_address_id": "idn_1",
            "email_addresses": [
                {"id": "idn_0", "email_address": "old@example.com"},
                {"id": "idn_1", "email_address": "new@example.com"}
            ]
        }
    });
    let timestamp = unix_now();
    let signature =
        signing::svix_signature(SVIX_SECRET, "msg_1", timestamp, event.to_string().as_bytes()).unwrap();

    let (status, body) = app
        .send(svix_request("msg_1", timestamp, &event, &signature))
        .await;
    assert_eq!(status, 200, "{}", body);

    let profile = app.profiles.get_profile("user_new").await.unwrap().unwrap();
    assert_eq!(profile.credit_balance, 3);
    assert_eq!(profile.email.as_deref(), Some("new@example.com"));
    assert_eq!(profile.tier(), SubscriptionTier::Free);

    // Redelivery keeps the single grant.
    let (status, _) = app
        .send(svix_request("msg_1", timestamp, &event, &signature))
        .await;
    assert_eq!(status, 200);
    assert_eq!(app.profiles.profile_count().await, 1);
}

#[tokio::test]
async fn test_clerk_rejects_missing_headers() {
    let app = TestAppBuilder::new().build().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/clerk-webhook")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"type":"user.created","data":{"id":"user_x"}}"#))
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, 400);
    assert_eq!(app.profiles.profile_count().await, 0);
}
