use std::sync::Arc;

use crate::api::{ApiClient, ApiError, SessionObserver};
use crate::auth::{AuthError, AuthState, SecureStore, Session};
use crate::config::ClientConfig;

/// The session and the transport, wired together.
///
/// Building both here guarantees the session is the client's only
/// observer before any request can be sent.
#[derive(Clone)]
pub struct AppContext {
    pub session: Session,
    pub api: ApiClient,
}

impl AppContext {
    pub fn new(config: &ClientConfig, store: Arc<dyn SecureStore>) -> Result<Self, ApiError> {
        let session = Session::new(store.clone());
        let observer: Arc<dyn SessionObserver> = Arc::new(session.clone());
        let api = ApiClient::new(config, store, Some(observer))?;
        Ok(Self { session, api })
    }

    pub async fn bootstrap(&self) -> AuthState {
        self.session.bootstrap().await
    }

    pub async fn login(&self, identifier: &str, secret: &str) -> Result<(), AuthError> {
        self.session.login(&self.api, identifier, secret).await
    }

    pub async fn logout(&self) {
        self.session.logout().await
    }
}
