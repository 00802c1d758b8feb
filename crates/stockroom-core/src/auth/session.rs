use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex, OnceCell};
use tracing::{debug, info, warn};

use super::credentials::{Credential, SecureStore, StoreError, ROLE_KEY, TOKEN_KEY};
use super::error::AuthError;
use crate::api::models::LoginPayload;
use crate::api::{ApiError, SessionObserver};

/// Who is logged in, as seen by the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Stored credentials have not been read yet
    Bootstrapping,
    Authenticated(Credential),
    Unauthenticated,
}

impl AuthState {
    pub fn credential(&self) -> Option<&Credential> {
        match self {
            AuthState::Authenticated(credential) => Some(credential),
            _ => None,
        }
    }
}

/// Typed view of a role claim. Unknown authorities are kept, not rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
    Other(String),
}

impl Role {
    pub fn from_authority(authority: &str) -> Self {
        let trimmed = authority.trim();
        let upper = trimmed.to_ascii_uppercase();
        match upper.strip_prefix("ROLE_").unwrap_or(upper.as_str()) {
            "ADMIN" => Role::Admin,
            "USER" => Role::User,
            _ => Role::Other(trimmed.to_string()),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Role::Other(_))
    }
}

/// Performs the credential exchange for [`Session::login`].
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, identifier: &str, secret: &str) -> Result<LoginPayload, ApiError>;
}

/// Outcome of reading the stored pair at startup
enum Stored {
    Empty,
    Valid(Credential),
    Corrupt(String),
}

struct Inner {
    store: Arc<dyn SecureStore>,
    state: watch::Sender<AuthState>,
    // Serializes every write to the stored pair
    writes: Mutex<()>,
    bootstrapped: OnceCell<()>,
}

/// Single source of truth for the current login.
///
/// Clones share state. The stored pair is always written role first and
/// removed token first, so a reader that finds a token also finds its role.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        let (state, _) = watch::channel(AuthState::Bootstrapping);
        Self {
            inner: Arc::new(Inner {
                store,
                state,
                writes: Mutex::new(()),
                bootstrapped: OnceCell::new(),
            }),
        }
    }

    /// Restore the stored session. Never fails; runs once, later calls
    /// wait for the first one and return the current state.
    pub async fn bootstrap(&self) -> AuthState {
        self.inner
            .bootstrapped
            .get_or_init(|| async {
                let _guard = self.inner.writes.lock().await;
                let next = match self.read_stored().await {
                    Stored::Empty => {
                        debug!("No stored session found");
                        AuthState::Unauthenticated
                    }
                    Stored::Valid(credential) => {
                        info!(role = credential.role(), "Restored stored session");
                        AuthState::Authenticated(credential)
                    }
                    Stored::Corrupt(reason) => {
                        warn!(%reason, "Discarding unusable stored session");
                        self.clear_stored().await;
                        AuthState::Unauthenticated
                    }
                };
                self.inner.state.send_replace(next);
            })
            .await;
        self.state()
    }

    /// Exchange credentials for a token and make it the active session.
    pub async fn login<A>(&self, authenticator: &A, identifier: &str, secret: &str) -> Result<(), AuthError>
    where
        A: Authenticator + ?Sized,
    {
        let payload = authenticator.authenticate(identifier, secret).await?;

        let role = payload
            .primary_role()
            .map(str::to_string)
            .ok_or(AuthError::MissingRole)?;
        let credential = Credential::new(payload.token, role).ok_or(AuthError::MissingToken)?;

        let _guard = self.inner.writes.lock().await;
        if let Err(e) = self.persist(&credential).await {
            warn!(error = %e, "Failed to persist session, rolling back");
            self.clear_stored().await;
            // Storage no longer holds any session, so neither may memory
            self.inner.state.send_replace(AuthState::Unauthenticated);
            return Err(e.into());
        }

        info!(role = credential.role(), "Login successful");
        self.inner
            .state
            .send_replace(AuthState::Authenticated(credential));
        Ok(())
    }

    /// Drop the active session. Safe to call when already logged out.
    pub async fn logout(&self) {
        let _guard = self.inner.writes.lock().await;
        self.clear_stored().await;

        let previous = self.inner.state.send_replace(AuthState::Unauthenticated);
        if matches!(previous, AuthState::Authenticated(_)) {
            info!("Logged out");
        } else {
            debug!("Logout requested with no active session");
        }
    }

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// True until [`Session::bootstrap`] has resolved. Logins and logouts
    /// that happen earlier do not end loading.
    pub fn is_loading(&self) -> bool {
        !self.inner.bootstrapped.initialized()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.inner.state.borrow(), AuthState::Authenticated(_))
    }

    pub fn credential(&self) -> Option<Credential> {
        self.inner.state.borrow().credential().cloned()
    }

    pub fn role(&self) -> Option<Role> {
        self.inner
            .state
            .borrow()
            .credential()
            .map(|c| Role::from_authority(c.role()))
    }

    async fn read_stored(&self) -> Stored {
        let store = &self.inner.store;
        let (token, role) = futures::join!(store.get(TOKEN_KEY), store.get(ROLE_KEY));

        match (token, role) {
            (Ok(None), _) => Stored::Empty,
            (Ok(Some(token)), Ok(Some(role))) => match Credential::new(token, role) {
                Some(credential) => Stored::Valid(credential),
                None => Stored::Corrupt("empty token or role".to_string()),
            },
            (Ok(Some(_)), Ok(None)) => Stored::Corrupt("token stored without a role".to_string()),
            (Err(e), _) | (_, Err(e)) => Stored::Corrupt(e.to_string()),
        }
    }

    async fn persist(&self, credential: &Credential) -> Result<(), StoreError> {
        self.inner.store.set(ROLE_KEY, credential.role()).await?;
        self.inner.store.set(TOKEN_KEY, credential.token()).await?;
        Ok(())
    }

    async fn clear_stored(&self) {
        for key in [TOKEN_KEY, ROLE_KEY] {
            if let Err(e) = self.inner.store.delete(key).await {
                warn!(key, error = %e, "Failed to delete stored credential");
            }
        }
    }
}

#[async_trait]
impl SessionObserver for Session {
    async fn session_expired(&self) {
        warn!("Server rejected the session token, logging out");
        self.logout().await;
    }
}
