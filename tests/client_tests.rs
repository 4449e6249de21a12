mod common;

use applaunch::core::{ACTION, CACHE_EXPIRATION, FEATURES, IN_APP, IS_USER_REGISTERED, USER_ID};
use applaunch::http::CLIENT_SECRET;
use applaunch::{
    AppLaunchClient, AppLaunchOptions, AppLaunchUser, ClientState, ErrorCode, HttpMethod,
    KeyValueStore, ManualClock, MemoryStore, RefreshPolicy, Region, ResponseSource,
};
use common::*;
use std::sync::Arc;

// ============================================================================
// Initialization
// ============================================================================

#[tokio::test]
async fn test_initialize_registers_then_fetches() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);

    let response = h.client.initialize(options(), user()).await.unwrap();

    assert_eq!(response.source, ResponseSource::Server);
    assert_eq!(response.features().len(), 2);
    assert_eq!(h.client.state(), ClientState::Registered);

    let requests = h.invoker.requests();
    assert_eq!(requests.len(), 2);

    assert_eq!(requests[0].method, HttpMethod::Post);
    assert_eq!(requests[0].url, format!("{}/applaunch/v1/apps/app-1/devices", BASE_URL));
    assert_eq!(requests[0].header_value(CLIENT_SECRET), Some("secret-1"));
    assert_eq!(requests[0].header_value("Content-Type"), Some("application/json"));
    let body = requests[0].body.as_ref().unwrap();
    assert_eq!(body["userId"], "alice");
    assert_eq!(body["deviceId"], DEVICE_ID);

    assert_eq!(requests[1].method, HttpMethod::Get);
    assert_eq!(requests[1].url, format!("{}/applaunch/v1/apps/app-1/actions", BASE_URL));
    assert_eq!(
        requests[1].query,
        vec![("deviceId".to_string(), DEVICE_ID.to_string())]
    );
    assert_eq!(requests[1].header_value(CLIENT_SECRET), Some("secret-1"));
}

#[tokio::test]
async fn test_initialize_with_blank_secret_stays_uninitialized() {
    let h = harness();
    let options = AppLaunchOptions::builder(Region::UsSouth, "app-1", "  ").build();

    let err = h.client.initialize(options, user()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::ConfigMissingRequired);
    assert_eq!(h.client.state(), ClientState::Uninitialized);
    assert_eq!(h.invoker.request_count(), 0);
}

#[tokio::test]
async fn test_initialize_with_blank_user_stays_uninitialized() {
    let h = harness();

    let err = h
        .client
        .initialize(options(), AppLaunchUser::new(""))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ConfigMissingRequired);
    assert!(!h.client.is_initialized());
}

#[tokio::test]
async fn test_initialize_twice_is_rejected() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);
    h.client.initialize(options(), user()).await.unwrap();

    let err = h.client.initialize(options(), user()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::SdkAlreadyInitialized);
    assert_eq!(h.invoker.request_count(), 2);
}

#[tokio::test]
async fn test_initialize_generates_and_persists_device_id() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);

    let options = AppLaunchOptions::builder(Region::UsSouth, "app-1", "secret-1")
        .base_url(BASE_URL)
        .build();
    h.client.initialize(options, user()).await.unwrap();

    let device_id = h.client.device_id().unwrap();
    assert!(!device_id.is_empty());
    assert_eq!(h.store.get("deviceId").unwrap(), Some(device_id));
}

#[tokio::test]
async fn test_default_features_served_before_first_fetch() {
    let h = harness();
    h.invoker.fail("offline");

    let options = AppLaunchOptions::builder(Region::UsSouth, "app-1", "secret-1")
        .device_id(DEVICE_ID)
        .base_url(BASE_URL)
        .default_features(serde_json::json!([
            {"code": "offline-mode", "properties": [{"code": "enabled", "value": true}]}
        ]))
        .build();

    let err = h.client.initialize(options, user()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::RegistrationFailure);
    assert_eq!(h.client.state(), ClientState::Initialized);
    assert!(h.client.has_feature("offline-mode"));
    assert_eq!(h.client.get_value("offline-mode", "enabled"), "true");
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_registration_accepts_405() {
    let h = harness();
    h.invoker.respond(405, "already exists");
    h.invoker.respond(200, ACTIONS_BODY);

    h.client.initialize(options(), user()).await.unwrap();

    assert!(h.client.is_registered());
    assert_eq!(h.store.get(IS_USER_REGISTERED).unwrap(), Some("true".to_string()));
    assert_eq!(h.store.get(USER_ID).unwrap(), Some("alice".to_string()));
}

#[tokio::test]
async fn test_registration_failure_surfaces_body() {
    let h = harness();
    h.invoker.respond(500, "server exploded");

    let err = h.client.initialize(options(), user()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::RegistrationFailure);
    assert_eq!(err.message, "server exploded");
    assert_eq!(h.client.state(), ClientState::Initialized);
    assert_eq!(h.invoker.request_count(), 1);
}

#[tokio::test]
async fn test_registration_transport_error() {
    let h = harness();
    h.invoker.fail("Connection failed");

    let err = h.client.initialize(options(), user()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::RegistrationFailure);
    assert_eq!(err.message, "Connection failed");
}

#[tokio::test]
async fn test_registration_400_clears_user_state() {
    let store = Arc::new(MemoryStore::new());
    store.set(USER_ID, "alice").unwrap();
    store.set(IS_USER_REGISTERED, "true").unwrap();
    store.set("userAttributes", r#"{"plan":"silver"}"#).unwrap();

    let h = harness_with_store(store.clone());
    h.invoker.respond(400, "bad request");

    let err = h.client.initialize(options(), user()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::RegistrationFailure);
    assert_eq!(h.invoker.requests()[0].method, HttpMethod::Put);
    assert_eq!(store.get(USER_ID).unwrap(), None);
    assert_eq!(store.get(IS_USER_REGISTERED).unwrap(), None);
    assert!(!h.client.is_registered());
}

#[tokio::test]
async fn test_already_registered_same_user_skips_registration() {
    let store = Arc::new(MemoryStore::new());
    store.set(USER_ID, "alice").unwrap();
    store.set(IS_USER_REGISTERED, "true").unwrap();
    store.set("userAttributes", r#"{"plan":"gold"}"#).unwrap();

    let h = harness_with_store(store);
    h.invoker.respond(200, ACTIONS_BODY);

    h.client.initialize(options(), user()).await.unwrap();

    let requests = h.invoker.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Get);
    assert!(h.client.is_registered());
}

#[tokio::test]
async fn test_update_user_uses_put() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);
    h.client.initialize(options(), user()).await.unwrap();

    // Cached snapshot is fresh, so only the PUT goes out.
    h.invoker.respond(200, "{}");
    let bob = AppLaunchUser::builder("bob").attribute("plan", "free").build();
    let response = h.client.update_user(bob).await.unwrap();

    assert_eq!(response.source, ResponseSource::Cache);
    let put = h.invoker.last_request().unwrap();
    assert_eq!(put.method, HttpMethod::Put);
    assert_eq!(put.body.as_ref().unwrap()["userId"], "bob");
    assert_eq!(h.store.get(USER_ID).unwrap(), Some("bob".to_string()));
    assert_eq!(h.client.user().unwrap().user_id, "bob");
}

#[tokio::test]
async fn test_update_user_before_initialize() {
    let h = harness();
    let err = h.client.update_user(user()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::SdkNotInitialized);
    assert_eq!(h.invoker.request_count(), 0);
}

// ============================================================================
// Fetching actions
// ============================================================================

#[tokio::test]
async fn test_fetch_404_leaves_cache_untouched() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(404, "Actions Not found");

    let err = h.client.initialize(options(), user()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::FetchActionsFailure);
    assert_eq!(err.message, "Actions Not found");
    for key in [CACHE_EXPIRATION, ACTION, FEATURES, IN_APP] {
        assert_eq!(h.store.get(key).unwrap(), None, "{} should not be written", key);
    }
    assert!(!h.client.has_feature("checkout"));
}

#[tokio::test]
async fn test_fetch_invalid_json_is_failure() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, "<html>oops</html>");

    let err = h.client.initialize(options(), user()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::FetchActionsFailure);
    assert_eq!(h.store.get(ACTION).unwrap(), None);
    assert_eq!(h.store.get(CACHE_EXPIRATION).unwrap(), None);
}

#[tokio::test]
async fn test_fetch_malformed_features_is_failure() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, r#"{"features": {"code": "not-a-list"}}"#);

    let err = h.client.initialize(options(), user()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::FetchActionsFailure);
    assert_eq!(h.store.get(ACTION).unwrap(), None);
}

#[tokio::test]
async fn test_fetch_persists_expiration_from_ttl() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);

    h.client.initialize(options(), user()).await.unwrap();

    assert_eq!(h.store.get(CACHE_EXPIRATION).unwrap(), Some("1300".to_string()));
}

#[tokio::test]
async fn test_refresh_on_expiry_serves_cache_then_refetches() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);
    h.client.initialize(options(), user()).await.unwrap();

    h.clock.set(1200);
    let cached = h.client.refresh_actions().await.unwrap();
    assert_eq!(cached.source, ResponseSource::Cache);
    assert_eq!(h.invoker.request_count(), 2);

    h.clock.set(1301);
    h.invoker.respond(200, r#"{"features": [{"code": "search"}]}"#);
    let fresh = h.client.refresh_actions().await.unwrap();
    assert_eq!(fresh.source, ResponseSource::Server);
    assert_eq!(h.invoker.request_count(), 3);
    assert_eq!(h.store.get(CACHE_EXPIRATION).unwrap(), Some("1601".to_string()));
}

#[tokio::test]
async fn test_refresh_on_every_start_always_fetches() {
    let h = harness();
    let options = AppLaunchOptions::builder(Region::UsSouth, "app-1", "secret-1")
        .device_id(DEVICE_ID)
        .base_url(BASE_URL)
        .refresh_policy(RefreshPolicy::RefreshOnEveryStart)
        .build();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);
    h.client.initialize(options, user()).await.unwrap();

    h.invoker.respond(200, ACTIONS_BODY);
    let response = h.client.refresh_actions().await.unwrap();

    assert_eq!(response.source, ResponseSource::Server);
    assert_eq!(h.invoker.request_count(), 3);
}

#[tokio::test]
async fn test_refresh_before_initialize() {
    let h = harness();
    let err = h.client.refresh_actions().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::SdkNotInitialized);
}

#[tokio::test]
async fn test_fetch_runs_triggers_once() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);
    h.client.initialize(options(), user()).await.unwrap();

    assert_eq!(h.handler.shown(), vec!["welcome".to_string()]);

    h.clock.set(2000);
    h.invoker.respond(200, ACTIONS_BODY);
    h.client.refresh_actions().await.unwrap();

    // OnceAndOnlyOnce does not fire again on the second fetch.
    assert_eq!(h.handler.shown(), vec!["welcome".to_string()]);
}

// ============================================================================
// Feature lookup
// ============================================================================

#[tokio::test]
async fn test_has_feature_tracks_latest_snapshot() {
    let h = harness();
    assert!(!h.client.has_feature("checkout"));

    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);
    h.client.initialize(options(), user()).await.unwrap();

    assert!(h.client.has_feature("checkout"));
    assert!(h.client.has_feature("search"));
    assert!(!h.client.has_feature("Checkout"));

    h.clock.set(5000);
    h.invoker.respond(200, r#"{"features": [{"code": "search"}]}"#);
    h.client.refresh_actions().await.unwrap();

    assert!(!h.client.has_feature("checkout"));
    assert!(h.client.has_feature("search"));
}

#[tokio::test]
async fn test_get_value_coerces_to_string() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);
    h.client.initialize(options(), user()).await.unwrap();

    assert_eq!(h.client.get_value("checkout", "buttonColor"), "green");
    assert_eq!(h.client.get_value("checkout", "maxItems"), "10");
    assert_eq!(h.client.get_value("checkout", "express"), "true");
    assert_eq!(h.client.get_value("checkout", "missing"), "");
    assert_eq!(h.client.get_value("missing", "buttonColor"), "");
}

#[tokio::test]
async fn test_lookups_without_cache_are_empty() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(500, "down");
    let _ = h.client.initialize(options(), user()).await;

    assert!(!h.client.has_feature("checkout"));
    assert_eq!(h.client.get_value("checkout", "buttonColor"), "");
    assert!(h.client.features().is_empty());
}

// ============================================================================
// Destroy
// ============================================================================

#[tokio::test]
async fn test_destroy_clears_state_on_204() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);
    h.client.initialize(options(), user()).await.unwrap();

    h.invoker.respond(204, "");
    h.client.destroy().await.unwrap();

    let request = h.invoker.last_request().unwrap();
    assert_eq!(request.method, HttpMethod::Delete);
    assert_eq!(
        request.url,
        format!("{}/applaunch/v1/apps/app-1/devices/{}", BASE_URL, DEVICE_ID)
    );

    assert_eq!(h.client.state(), ClientState::Uninitialized);
    for key in [USER_ID, IS_USER_REGISTERED, CACHE_EXPIRATION, ACTION, FEATURES, IN_APP] {
        assert_eq!(h.store.get(key).unwrap(), None, "{} should be cleared", key);
    }
    // Trigger markers survive.
    assert_eq!(
        h.store.get("welcomeOnceAndOnlyOnce").unwrap(),
        Some("OnceAndOnlyOnce".to_string())
    );
}

#[tokio::test]
async fn test_destroy_resets_client_when_store_cannot_clear() {
    let store = FlakyStore::new();
    let invoker = ScriptedInvoker::new();
    let client = AppLaunchClient::builder()
        .store(store.clone())
        .invoker(invoker.clone())
        .clock(Arc::new(ManualClock::new(1000)))
        .message_handler(RecordingHandler::new())
        .build()
        .unwrap();
    invoker.respond(201, "{}");
    invoker.respond(200, ACTIONS_BODY);
    client.initialize(options(), user()).await.unwrap();

    store.reject_removes();
    invoker.respond(204, "");
    client.destroy().await.unwrap();

    assert_eq!(client.state(), ClientState::Uninitialized);
    assert!(client.device_id().is_none());
}

#[tokio::test]
async fn test_destroy_failure_keeps_state() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);
    h.client.initialize(options(), user()).await.unwrap();

    h.invoker.respond(500, "cannot delete");
    let err = h.client.destroy().await.unwrap_err();

    assert_eq!(err.code, ErrorCode::UnregistrationFailure);
    assert_eq!(err.message, "cannot delete");
    assert_eq!(h.client.state(), ClientState::Registered);
    assert!(h.client.has_feature("checkout"));
}

#[tokio::test]
async fn test_destroy_before_initialize() {
    let h = harness();
    let err = h.client.destroy().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::UnregistrationFailure);
    assert_eq!(h.invoker.request_count(), 0);
}

#[tokio::test]
async fn test_initialize_again_after_destroy() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);
    h.client.initialize(options(), user()).await.unwrap();
    h.invoker.respond(204, "");
    h.client.destroy().await.unwrap();

    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);
    h.client.initialize(options(), user()).await.unwrap();

    assert!(h.client.is_registered());
    assert_eq!(h.invoker.requests()[3].method, HttpMethod::Post);
}

// ============================================================================
// Metrics
// ============================================================================

#[tokio::test]
async fn test_send_metrics_posts_codes() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);
    h.client.initialize(options(), user()).await.unwrap();

    h.invoker.respond(200, "");
    h.client
        .send_metrics(&["m1".to_string(), "m2".to_string()])
        .await;

    let request = h.invoker.last_request().unwrap();
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(
        request.url,
        format!("{}/applaunch/v1/apps/app-1/devices/{}/events/metrics", BASE_URL, DEVICE_ID)
    );
    assert_eq!(
        request.body,
        Some(serde_json::json!({"metricCodes": ["m1", "m2"]}))
    );
}

#[tokio::test]
async fn test_send_metrics_noop_when_not_registered() {
    let h = harness();
    h.client.send_metrics(&["m1".to_string()]).await;
    assert_eq!(h.invoker.request_count(), 0);

    h.invoker.respond(500, "down");
    let _ = h.client.initialize(options(), user()).await;
    h.client.send_metrics(&["m1".to_string()]).await;
    assert_eq!(h.invoker.request_count(), 1);
}

#[tokio::test]
async fn test_send_metrics_failure_is_swallowed() {
    let h = harness();
    h.invoker.respond(201, "{}");
    h.invoker.respond(200, ACTIONS_BODY);
    h.client.initialize(options(), user()).await.unwrap();

    h.invoker.fail("timeout");
    h.client.send_metrics(&["m1".to_string()]).await;

    assert!(h.client.is_registered());
}
