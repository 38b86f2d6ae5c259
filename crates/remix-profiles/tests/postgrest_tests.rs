//! PostgREST store tests against a mock server.

use remix_models::{NewProfile, SubscriptionPatch, SubscriptionTier};
use remix_profiles::{PostgrestConfig, PostgrestProfileStore, ProfileError, ProfileStore, RetryConfig};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(server: &MockServer) -> PostgrestProfileStore {
    let config = PostgrestConfig::new(server.uri(), "service-key").with_retry(RetryConfig::none());
    PostgrestProfileStore::new(config).unwrap()
}

fn row(id: &str, balance: i64) -> serde_json::Value {
    json!({
        "id": id,
        "email": "a@example.com",
        "credit_balance": balance,
        "subscription_tier": "free",
        "subscription_status": null,
        "subscription_plan_id": null,
        "stripe_customer_id": null,
        "stripe_subscription_id": null,
        "created_at": "2024-05-01T12:00:00Z"
    })
}

#[tokio::test]
async fn test_get_profile_filters_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", "eq.user_1"))
        .and(header("apikey", "service-key"))
        .and(header("authorization", "Bearer service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row("user_1", 3)])))
        .mount(&server)
        .await;

    let profile = store(&server).get_profile("user_1").await.unwrap().unwrap();
    assert_eq!(profile.credit_balance, 3);
    assert_eq!(profile.tier(), SubscriptionTier::Free);
}

#[tokio::test]
async fn test_missing_profile_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert!(store(&server).get_profile("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_profile_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&server)
        .await;

    let err = store(&server)
        .create_profile(NewProfile::signup("user_1", None))
        .await
        .unwrap_err();
    assert!(matches!(err, ProfileError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_adjust_credits_calls_rpc() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/adjust_credits"))
        .and(body_json(json!({"p_user_id": "user_1", "p_delta": -1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(2)))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(store(&server).adjust_credits("user_1", -1).await.unwrap(), 2);
}

#[tokio::test]
async fn test_adjust_credits_insufficient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/adjust_credits"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "P0001",
            "message": "insufficient_credits"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = store(&server).adjust_credits("user_1", -1).await.unwrap_err();
    assert!(matches!(err, ProfileError::InsufficientCredits(ref id) if id == "user_1"));
}

#[tokio::test]
async fn test_update_subscription_by_subscription_counts_rows() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("stripe_subscription_id", "eq.sub_1"))
        .and(body_json(json!({"subscription_status": "canceled"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row("user_1", 0)])))
        .mount(&server)
        .await;

    let touched = store(&server)
        .update_subscription_by_subscription_id("sub_1", &SubscriptionPatch::status("canceled"))
        .await
        .unwrap();
    assert_eq!(touched, 1);
}

#[tokio::test]
async fn test_claim_event_detects_replay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/processed_events"))
        .and(body_json(json!({"event_id": "evt_new", "source": "stripe"})))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/processed_events"))
        .and(body_json(json!({"event_id": "evt_seen", "source": "stripe"})))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let store = store(&server);
    assert!(store.claim_event("evt_new", "stripe").await.unwrap());
    assert!(!store.claim_event("evt_seen", "stripe").await.unwrap());
}

#[tokio::test]
async fn test_reads_retry_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row("user_1", 5)])))
        .mount(&server)
        .await;

    let config = PostgrestConfig::new(server.uri(), "service-key").with_retry(RetryConfig {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
    });
    let store = PostgrestProfileStore::new(config).unwrap();
    let profile = store.get_profile("user_1").await.unwrap().unwrap();
    assert_eq!(profile.credit_balance, 5);
}
