//! Integration tests for the poll controller.

use credential_store::{CredentialStore, ExposeSecret, SecretString, Slot};
use registrations_client::{RegistrationsClient, RegistrationsError, RegistrationWatcher};
use std::time::Duration;
use tokio::time::sleep;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Create a watcher over a memory store that already holds a token.
async fn create_test_watcher(mock_server: &MockServer, interval: Duration) -> RegistrationWatcher {
    let store = CredentialStore::memory();
    store
        .set(Slot::AccessToken, SecretString::new("tok-1".into()))
        .await
        .unwrap();

    let client =
        RegistrationsClient::new(mock_server.uri(), store, Duration::from_secs(5)).unwrap();
    RegistrationWatcher::new(client, interval)
}

fn list_response(names: &[&str]) -> ResponseTemplate {
    let registrations: Vec<_> = names
        .iter()
        .map(|name| serde_json::json!({"Name": name}))
        .collect();
    ResponseTemplate::new(200).set_body_json(serde_json::json!({"registrations": registrations}))
}

async fn request_count(mock_server: &MockServer) -> usize {
    mock_server.received_requests().await.unwrap().len()
}

#[tokio::test]
async fn test_fetch_now_replaces_list() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/registrations"))
        .respond_with(list_response(&["Ada", "Grace"]))
        .mount(&mock_server)
        .await;

    let watcher = create_test_watcher(&mock_server, Duration::from_secs(30)).await;
    watcher.fetch_now().await.unwrap();

    let state = watcher.state();
    assert_eq!(state.registrations.len(), 2);
    assert_eq!(state.registrations[0].name.as_deref(), Some("Ada"));
    assert!(!state.loading);
    assert!(!state.polling);
    assert!(state.last_error.is_none());
    assert!(state.last_updated.is_some());
}

#[tokio::test]
async fn test_fetch_now_without_key_makes_no_request() {
    let mock_server = MockServer::start().await;

    let store = CredentialStore::memory();
    let client =
        RegistrationsClient::new(mock_server.uri(), store, Duration::from_secs(5)).unwrap();
    let watcher = RegistrationWatcher::new(client, Duration::from_secs(30));

    let result = watcher.fetch_now().await;

    assert!(matches!(result, Err(RegistrationsError::MissingApiKey)));
    assert_eq!(request_count(&mock_server).await, 0);

    let state = watcher.state();
    assert!(!state.loading);
    assert!(state.last_error.is_some());
}

#[tokio::test]
async fn test_failed_fetch_preserves_previous_list() {
    let mock_server = MockServer::start().await;

    // First fetch succeeds, every later one hits a server error.
    Mock::given(method("GET"))
        .and(path("/api/registrations"))
        .respond_with(list_response(&["Ada"]))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/registrations"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .mount(&mock_server)
        .await;

    let watcher = create_test_watcher(&mock_server, Duration::from_secs(30)).await;
    watcher.fetch_now().await.unwrap();

    let result = watcher.fetch_now().await;
    assert!(matches!(
        result,
        Err(RegistrationsError::Server { status: 500, .. })
    ));

    let state = watcher.state();
    assert_eq!(state.registrations.len(), 1);
    assert_eq!(state.registrations[0].name.as_deref(), Some("Ada"));
    assert!(!state.loading);
    assert!(state.last_error.is_some());
}

#[tokio::test]
async fn test_start_polling_fetches_immediately_then_on_ticks() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/registrations"))
        .respond_with(list_response(&["Ada"]))
        .mount(&mock_server)
        .await;

    let watcher = create_test_watcher(&mock_server, Duration::from_millis(200)).await;
    watcher.start_polling();
    assert!(watcher.is_polling());
    assert!(watcher.state().polling);

    sleep(Duration::from_millis(500)).await;
    watcher.stop_polling();

    // Immediate fetch plus roughly two ticks
    let count = request_count(&mock_server).await;
    assert!((2..=4).contains(&count), "unexpected fetch count {count}");
    assert_eq!(watcher.state().registrations.len(), 1);
}

#[tokio::test]
async fn test_start_polling_twice_keeps_single_timer() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/registrations"))
        .respond_with(list_response(&[]))
        .mount(&mock_server)
        .await;

    let watcher = create_test_watcher(&mock_server, Duration::from_millis(300)).await;
    watcher.start_polling();
    watcher.start_polling();

    sleep(Duration::from_millis(750)).await;
    watcher.stop_polling();

    // A second timer would double this
    let count = request_count(&mock_server).await;
    assert!((2..=4).contains(&count), "unexpected fetch count {count}");

    // One stop suffices because only one timer was ever armed
    assert!(!watcher.is_polling());
}

#[tokio::test]
async fn test_stop_polling_halts_fetches() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/registrations"))
        .respond_with(list_response(&[]))
        .mount(&mock_server)
        .await;

    let watcher = create_test_watcher(&mock_server, Duration::from_millis(100)).await;
    watcher.start_polling();
    sleep(Duration::from_millis(250)).await;

    watcher.stop_polling();
    assert!(!watcher.is_polling());
    assert!(!watcher.state().polling);

    // Allow any in-flight fetch to finish, then verify silence
    sleep(Duration::from_millis(100)).await;
    let count_after_stop = request_count(&mock_server).await;
    sleep(Duration::from_millis(400)).await;
    assert_eq!(request_count(&mock_server).await, count_after_stop);
}

#[tokio::test]
async fn test_stop_when_idle_is_noop() {
    let mock_server = MockServer::start().await;
    let watcher = create_test_watcher(&mock_server, Duration::from_millis(100)).await;

    watcher.stop_polling();
    assert!(!watcher.is_polling());
    assert_eq!(request_count(&mock_server).await, 0);
}

#[tokio::test]
async fn test_poll_loop_survives_failing_tick() {
    let mock_server = MockServer::start().await;

    // First tick fails, later ticks succeed.
    Mock::given(method("GET"))
        .and(path("/api/registrations"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/registrations"))
        .respond_with(list_response(&["Ada"]))
        .mount(&mock_server)
        .await;

    let watcher = create_test_watcher(&mock_server, Duration::from_millis(150)).await;
    watcher.start_polling();
    sleep(Duration::from_millis(400)).await;
    watcher.stop_polling();

    let state = watcher.state();
    assert_eq!(state.registrations.len(), 1);
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn test_drop_cancels_timer() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/registrations"))
        .respond_with(list_response(&[]))
        .mount(&mock_server)
        .await;

    let watcher = create_test_watcher(&mock_server, Duration::from_millis(100)).await;
    watcher.start_polling();
    sleep(Duration::from_millis(150)).await;
    drop(watcher);

    sleep(Duration::from_millis(100)).await;
    let count_after_drop = request_count(&mock_server).await;
    sleep(Duration::from_millis(400)).await;
    assert_eq!(request_count(&mock_server).await, count_after_drop);
}

#[tokio::test]
async fn test_subscriber_sees_refresh() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/registrations"))
        .respond_with(list_response(&["Ada"]))
        .mount(&mock_server)
        .await;

    let watcher = create_test_watcher(&mock_server, Duration::from_secs(30)).await;
    let mut updates = watcher.subscribe();

    watcher.fetch_now().await.unwrap();

    updates.changed().await.unwrap();
    let state = updates.borrow_and_update().clone();
    assert_eq!(state.registrations.len(), 1);
}

#[tokio::test]
async fn test_api_key_surface_roundtrip() {
    let mock_server = MockServer::start().await;
    let watcher = create_test_watcher(&mock_server, Duration::from_secs(30)).await;

    assert!(watcher.stored_api_key().await.unwrap().is_none());

    watcher.save_api_key("admin-key").await.unwrap();
    let stored = watcher.stored_api_key().await.unwrap();
    assert_eq!(stored.unwrap().expose_secret(), "admin-key");

    watcher.clear_api_key().await.unwrap();
    assert!(watcher.stored_api_key().await.unwrap().is_none());
}
