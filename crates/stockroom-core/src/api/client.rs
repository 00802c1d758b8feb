//! Authenticated HTTP client for the Stockroom REST API.
//!
//! Every request reads the bearer token from secure storage right before it
//! is sent, so a logout takes effect on the very next call. Responses with a
//! 401 status notify the [`SessionObserver`] before the error is returned.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header, Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::models::{Envelope, ForgotPasswordRequest, LoginPayload, LoginRequest};
use super::resource::Resource;
use super::ApiError;
use crate::auth::{Authenticator, SecureStore, TOKEN_KEY};
use crate::config::ClientConfig;

// ============================================================================
// Constants
// ============================================================================

/// Login endpoint path
const LOGIN_PATH: &str = "/api/auth/login";

/// Password reset endpoint path
const FORGOT_PASSWORD_PATH: &str = "/api/auth/forgot-password";

/// Receives the transport's "session is no longer valid" signal.
#[async_trait]
pub trait SessionObserver: Send + Sync {
    /// Called once per 401 response. May run when already logged out.
    async fn session_expired(&self);
}

/// API client for the Stockroom backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: Arc<dyn SecureStore>,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn SecureStore>,
        observer: Option<Arc<dyn SessionObserver>>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::ClientBuild)?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            store,
            observer,
        })
    }

    /// Create a new ApiClient reporting to a different observer, sharing the
    /// connection pool. The previous observer is no longer notified by the
    /// returned client.
    pub fn with_session_observer(&self, observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            client: self.client.clone(), // Cheap clone, shares connection pool
            base_url: self.base_url.clone(),
            store: self.store.clone(),
            observer: Some(observer),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Headers for an outgoing request, with the current stored token if any.
    async fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        let token = match self.store.get(TOKEN_KEY).await {
            Ok(token) => token,
            Err(e) => {
                // Unreadable storage is treated like no token
                warn!(error = %e, "Could not read stored token, sending unauthenticated");
                None
            }
        };
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning a classified error if not.
    async fn check_response(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %response.url(), "Request rejected as unauthenticated");
            if let Some(ref observer) = self.observer {
                observer.session_expired().await;
            }
            return Err(ApiError::AuthenticationExpired);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(%status, error = %e, "Failed to read error response body");
                String::new()
            }
        };
        let err = ApiError::from_status(status, &body);
        debug!(%status, error = %err, "Request failed");
        Err(err)
    }

    /// Send a request and return the raw response on 2xx.
    pub async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .headers(self.auth_headers().await?);
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, url = %url, "Sending request");
        let response = request.send().await.map_err(|e| {
            let err = ApiError::connection(e);
            warn!(%method, url = %url, error = %err, "No response from server");
            err
        })?;

        self.check_response(response).await
    }

    async fn send_json<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.send(method, path, body).await?;
        let text = response.text().await.map_err(ApiError::connection)?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{} ({})", e, path)))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(Method::GET, path, None::<&()>).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send_json(Method::POST, path, Some(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send_json(Method::PUT, path, Some(body)).await
    }

    /// DELETE, ignoring whatever body the server sends back.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, path, None::<&()>).await?;
        Ok(())
    }

    // ===== Auth Endpoints =====

    /// Exchange identifier and secret for a token and role claims
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<LoginPayload, ApiError> {
        let envelope: Envelope<LoginPayload> = self
            .post(LOGIN_PATH, &LoginRequest { identifier, secret })
            .await?;
        Ok(envelope.data)
    }

    /// Ask the backend to send a password reset message
    pub async fn forgot_password(&self, email: &str) -> Result<serde_json::Value, ApiError> {
        let response = self
            .send(Method::POST, FORGOT_PASSWORD_PATH, Some(&ForgotPasswordRequest { email }))
            .await?;
        let text = response.text().await.map_err(ApiError::connection)?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    // ===== Domain Collections =====

    /// Typed CRUD handle over a collection such as `/api/products`
    pub fn resource<T: DeserializeOwned>(&self, path: impl Into<String>) -> Resource<'_, T> {
        Resource::new(self, path.into())
    }
}

#[async_trait]
impl Authenticator for ApiClient {
    async fn authenticate(&self, identifier: &str, secret: &str) -> Result<LoginPayload, ApiError> {
        self.login(identifier, secret).await
    }
}
