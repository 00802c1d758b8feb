use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use stockroom_core::{ClientConfig, SessionObserver};

static INIT: Once = Once::new();

pub const VALID_TOKEN: &str = "tok-123";
pub const VALID_ROLE: &str = "ROLE_ADMIN";

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("stockroom_core=debug".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

async fn whoami(headers: HeaderMap) -> Json<Value> {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(json!({ "data": { "authorization": authorization } }))
}

async fn login(Json(body): Json<Value>) -> Response {
    let identifier = body["identifier"].as_str().unwrap_or_default();
    let secret = body["secret"].as_str().unwrap_or_default();
    match (identifier, secret) {
        ("norole", _) => Json(json!({ "data": { "token": "tok-norole", "roles": [] } })).into_response(),
        (_, "correct") => Json(json!({
            "data": {
                "token": VALID_TOKEN,
                "roles": [{ "authority": VALID_ROLE }, { "authority": "ROLE_USER" }]
            }
        }))
        .into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "title": "Unauthorized", "description": "Bad credentials" })),
        )
            .into_response(),
    }
}

async fn forgot_password(Json(body): Json<Value>) -> Response {
    match body["email"].as_str() {
        Some(email) if email.contains('@') => Json(json!({ "data": { "sent": true } })).into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "result": [{ "field": "email", "descriptions": ["must be a well-formed email address"] }],
                "title": "Bad Request",
                "description": "Validation failed"
            })),
        )
            .into_response(),
    }
}

async fn protected() -> StatusCode {
    StatusCode::UNAUTHORIZED
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(3)).await;
    Json(json!({ "data": null }))
}

async fn boom() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "database on fire")
}

/// Sends the status and part of the body, then drops the connection.
async fn truncated() -> Response {
    use futures::{stream, StreamExt};

    let partial = stream::once(async { Ok::<_, std::io::Error>("database on") });
    let failure = stream::once(async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Err(std::io::Error::other("backend crashed"))
    });
    (
        StatusCode::BAD_GATEWAY,
        axum::body::Body::from_stream(partial.chain(failure)),
    )
        .into_response()
}

async fn list_products() -> Json<Value> {
    Json(json!({ "data": [
        { "id": 1, "name": "Widget", "sku": "W-1" },
        { "id": 2, "name": "Gadget", "sku": "G-2" }
    ] }))
}

async fn create_product(Json(body): Json<Value>) -> Response {
    if body["sku"].as_str().map(str::is_empty).unwrap_or(true) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "result": [{ "field": "sku", "descriptions": ["must not be blank"] }],
                "title": "Unprocessable Entity",
                "description": "Validation failed"
            })),
        )
            .into_response();
    }
    let mut created = body;
    created["id"] = json!(3);
    (StatusCode::CREATED, Json(json!({ "data": created }))).into_response()
}

fn router() -> Router {
    Router::new()
        .route("/api/whoami", get(whoami))
        .route("/api/auth/login", post(login))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/protected", get(protected))
        .route("/api/slow", get(slow))
        .route("/api/boom", get(boom))
        .route("/api/truncated", get(truncated))
        .route("/api/products", get(list_products).post(create_product))
}

/// Start the fake backend and return its base URL (with a trailing slash,
/// as a careless deployment would configure it).
pub async fn spawn_backend() -> String {
    setup_tracing();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router()).await.expect("test server failed");
    });
    format!("http://{}/", addr)
}

pub fn client_config(base_url: &str, timeout: Duration) -> ClientConfig {
    ClientConfig {
        base_url: base_url.trim_end_matches('/').to_string(),
        timeout,
    }
}

/// Observer that only counts notifications
#[derive(Default)]
pub struct CountingObserver {
    pub calls: AtomicUsize,
}

impl CountingObserver {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionObserver for CountingObserver {
    async fn session_expired(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[allow(dead_code)]
pub fn observer() -> Arc<CountingObserver> {
    Arc::new(CountingObserver::default())
}
