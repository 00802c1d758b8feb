mod common;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use stockroom_core::api::{ApiClient, ApiError, Collection, ConnectionKind};
use stockroom_core::auth::{MemoryStore, SecureStore, ROLE_KEY, TOKEN_KEY};

#[derive(Debug, Deserialize)]
struct WhoAmI {
    authorization: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Product {
    id: u64,
    name: String,
    sku: String,
}

async fn whoami(client: &ApiClient) -> Option<String> {
    let reply: Envelope<WhoAmI> = client.get("/api/whoami").await.expect("whoami should succeed");
    reply.data.authorization
}

#[tokio::test]
async fn test_bearer_matches_stored_token() {
    let base = common::spawn_backend().await;
    let store = Arc::new(MemoryStore::with_entries([(TOKEN_KEY, "abc"), (ROLE_KEY, "ROLE_USER")]));
    let client = ApiClient::new(
        &common::client_config(&base, Duration::from_secs(5)),
        store.clone(),
        None,
    )
    .unwrap();

    assert_eq!(whoami(&client).await.as_deref(), Some("Bearer abc"));

    // Token changes are picked up without rebuilding the client
    store.set(TOKEN_KEY, "rotated").await.unwrap();
    assert_eq!(whoami(&client).await.as_deref(), Some("Bearer rotated"));
}

#[tokio::test]
async fn test_no_header_without_token() {
    let base = common::spawn_backend().await;
    let client = ApiClient::new(
        &common::client_config(&base, Duration::from_secs(5)),
        Arc::new(MemoryStore::new()),
        None,
    )
    .unwrap();

    assert_eq!(whoami(&client).await, None);
}

#[tokio::test]
async fn test_concurrent_requests_each_carry_token() {
    let base = common::spawn_backend().await;
    let store = Arc::new(MemoryStore::with_entries([(TOKEN_KEY, "abc")]));
    let client = ApiClient::new(&common::client_config(&base, Duration::from_secs(5)), store, None).unwrap();

    let replies = futures::future::join_all((0..8).map(|_| whoami(&client))).await;
    assert!(replies.iter().all(|r| r.as_deref() == Some("Bearer abc")));
}

#[tokio::test]
async fn test_success_returns_response_unmodified() {
    let base = common::spawn_backend().await;
    let client = ApiClient::new(
        &common::client_config(&base, Duration::from_secs(5)),
        Arc::new(MemoryStore::new()),
        None,
    )
    .unwrap();

    let response = client
        .send(Method::GET, "/api/products", None::<&()>)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"][0]["name"], "Widget");
}

#[tokio::test]
async fn test_unauthorized_notifies_observer_once_and_still_fails() {
    let base = common::spawn_backend().await;
    let observer = common::observer();
    let client = ApiClient::new(
        &common::client_config(&base, Duration::from_secs(5)),
        Arc::new(MemoryStore::with_entries([(TOKEN_KEY, "stale")])),
        Some(observer.clone()),
    )
    .unwrap();

    let err = client.get::<Value>("/api/protected").await.unwrap_err();

    assert!(err.is_authentication_expired());
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(observer.count(), 1);
}

#[tokio::test]
async fn test_replaced_observer_is_not_notified() {
    let base = common::spawn_backend().await;
    let first = common::observer();
    let second = common::observer();
    let client = ApiClient::new(
        &common::client_config(&base, Duration::from_secs(5)),
        Arc::new(MemoryStore::new()),
        Some(first.clone()),
    )
    .unwrap()
    .with_session_observer(second.clone());

    let _ = client.get::<Value>("/api/protected").await;

    assert_eq!(first.count(), 0);
    assert_eq!(second.count(), 1);
}

#[tokio::test]
async fn test_other_statuses_do_not_notify_observer() {
    let base = common::spawn_backend().await;
    let observer = common::observer();
    let client = ApiClient::new(
        &common::client_config(&base, Duration::from_secs(5)),
        Arc::new(MemoryStore::new()),
        Some(observer.clone()),
    )
    .unwrap();

    let err = client.get::<Value>("/api/boom").await.unwrap_err();
    match err {
        ApiError::UnexpectedStatus { status, ref body } => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, "database on fire");
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }

    let err = client
        .resource::<Product>(Collection::Products.path())
        .create(&json!({ "name": "Nameless", "sku": "" }))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::UNPROCESSABLE_ENTITY));
    assert_eq!(
        err.field_errors().get("sku"),
        Some(&vec!["must not be blank".to_string()])
    );

    assert_eq!(observer.count(), 0);
}

#[tokio::test]
async fn test_unreadable_error_body_keeps_status() {
    let base = common::spawn_backend().await;
    let client = ApiClient::new(
        &common::client_config(&base, Duration::from_secs(5)),
        Arc::new(MemoryStore::new()),
        None,
    )
    .unwrap();

    let err = client.get::<Value>("/api/truncated").await.unwrap_err();
    match err {
        ApiError::UnexpectedStatus { status, ref body } => {
            assert_eq!(status, StatusCode::BAD_GATEWAY);
            assert!(body.is_empty());
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_is_connection_error() {
    let base = common::spawn_backend().await;
    let client = ApiClient::new(
        &common::client_config(&base, Duration::from_millis(200)),
        Arc::new(MemoryStore::new()),
        None,
    )
    .unwrap();

    let err = client.get::<Value>("/api/slow").await.unwrap_err();
    match err {
        ApiError::Connection { kind, .. } => assert_eq!(kind, ConnectionKind::Timeout),
        other => panic!("expected a connection error, got {other:?}"),
    }
    assert!(err_message_mentions_timeout(&client).await);
}

async fn err_message_mentions_timeout(client: &ApiClient) -> bool {
    let err = client.get::<Value>("/api/slow").await.unwrap_err();
    err.is_connection() && err.user_message().contains("timed out")
}

#[tokio::test]
async fn test_refused_connection_is_unreachable() {
    // Grab a free port, then release it so nothing is listening
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let observer = common::observer();
    let client = ApiClient::new(
        &common::client_config(&format!("http://127.0.0.1:{}", port), Duration::from_secs(5)),
        Arc::new(MemoryStore::new()),
        Some(observer.clone()),
    )
    .unwrap();

    let err = client.get::<Value>("/api/whoami").await.unwrap_err();
    match err {
        ApiError::Connection { kind, .. } => assert_eq!(kind, ConnectionKind::Unreachable),
        other => panic!("expected a connection error, got {other:?}"),
    }
    assert_eq!(observer.count(), 0);
}

#[tokio::test]
async fn test_resource_list_unwraps_envelope() {
    let base = common::spawn_backend().await;
    let client = ApiClient::new(
        &common::client_config(&base, Duration::from_secs(5)),
        Arc::new(MemoryStore::new()),
        None,
    )
    .unwrap();

    let products = client
        .resource::<Product>(Collection::Products.path())
        .list()
        .await
        .unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[1].sku, "G-2");

    let created = client
        .resource::<Product>(Collection::Products.path())
        .create(&json!({ "name": "Sprocket", "sku": "S-3" }))
        .await
        .unwrap();
    assert_eq!(
        created,
        Product {
            id: 3,
            name: "Sprocket".to_string(),
            sku: "S-3".to_string()
        }
    );
}

#[tokio::test]
async fn test_forgot_password() {
    let base = common::spawn_backend().await;
    let client = ApiClient::new(
        &common::client_config(&base, Duration::from_secs(5)),
        Arc::new(MemoryStore::new()),
        None,
    )
    .unwrap();

    let reply = client.forgot_password("ana@example.com").await.unwrap();
    assert_eq!(reply["data"]["sent"], true);

    let err = client.forgot_password("not-an-email").await.unwrap_err();
    assert!(matches!(err, ApiError::Validation { .. }));
    assert!(err.user_message().starts_with("email:"));
}
