use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keyring::Entry;
use thiserror::Error;

/// Keychain service name the credential pair lives under
const SERVICE_NAME: &str = "stockroom";

/// Storage key of the bearer token. Its absence means "logged out".
pub const TOKEN_KEY: &str = "userToken";

/// Storage key of the role claim that belongs to the token
pub const ROLE_KEY: &str = "userRole";

/// The persisted token and role pair identifying a session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    role: String,
}

impl Credential {
    /// Build a credential; both halves must be non-empty.
    pub fn new(token: impl Into<String>, role: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let role = role.into();
        if token.is_empty() || role.trim().is_empty() {
            return None;
        }
        Some(Self { token, role })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn role(&self) -> &str {
        &self.role
    }
}

// Keep tokens out of logs and panic messages.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Secure storage unavailable: {0}")]
    Unavailable(String),

    #[error("Secure storage failure: {0}")]
    Backend(String),
}

/// Encrypted-at-rest string key-value storage.
#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// OS keychain backed store
///
/// One keyring `Entry` is built per key and reused, so every call for a
/// key talks to the same credential.
#[derive(Debug)]
pub struct KeyringStore {
    service: String,
    entries: Mutex<HashMap<String, Arc<Entry>>>,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, key: &str) -> Result<Arc<Entry>, StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get(key) {
            return Ok(entry.clone());
        }
        let entry = Arc::new(Entry::new(&self.service, key).map_err(map_keyring_error)?);
        entries.insert(key.to_string(), entry.clone());
        Ok(entry)
    }

    async fn run<T, F>(&self, key: &str, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Entry) -> keyring::Result<T> + Send + 'static,
    {
        let entry = self.entry(key)?;
        tokio::task::spawn_blocking(move || op(&entry).map_err(map_keyring_error))
            .await
            .map_err(|e| StoreError::Backend(format!("keychain task failed: {}", e)))?
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

fn map_keyring_error(err: keyring::Error) -> StoreError {
    match err {
        keyring::Error::NoStorageAccess(e) | keyring::Error::PlatformFailure(e) => {
            StoreError::Unavailable(e.to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl SecureStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.run(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let value = value.to_string();
        self.run(key, move |entry| entry.set_password(&value)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.run(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        })
        .await
    }
}

/// In-process store for tests and headless runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Synchronous peek, for assertions.
    pub fn snapshot(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.lock().remove(key);
        Ok(())
    }
}
