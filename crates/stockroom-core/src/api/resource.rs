//! Generic CRUD access to the backend's domain collections.
//!
//! The backend wraps every successful payload in `{ "data": ... }`; this
//! module unwraps it so callers deal only in their own record types.

use std::fmt::Display;
use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};

use super::client::ApiClient;
use super::models::Envelope;
use super::ApiError;

/// Well-known collections exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Products,
    Catalogues,
    AuditLogs,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::Products,
        Collection::Catalogues,
        Collection::AuditLogs,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Collection::Users => "/api/users",
            Collection::Products => "/api/products",
            Collection::Catalogues => "/api/catalogues",
            Collection::AuditLogs => "/api/audit-logs",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Products => "products",
            Collection::Catalogues => "catalogues",
            Collection::AuditLogs => "audit-logs",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|c| c.name() == normalized)
    }
}

/// Typed handle over one collection path
pub struct Resource<'a, T> {
    client: &'a ApiClient,
    path: String,
    _record: PhantomData<fn() -> T>,
}

impl<'a, T: DeserializeOwned> Resource<'a, T> {
    pub(crate) fn new(client: &'a ApiClient, path: String) -> Self {
        Self {
            client,
            path: path.trim_end_matches('/').to_string(),
            _record: PhantomData,
        }
    }

    fn item_path(&self, id: impl Display) -> String {
        format!("{}/{}", self.path, id)
    }

    pub async fn list(&self) -> Result<Vec<T>, ApiError> {
        let envelope: Envelope<Vec<T>> = self.client.get(&self.path).await?;
        Ok(envelope.data)
    }

    pub async fn get(&self, id: impl Display) -> Result<T, ApiError> {
        let envelope: Envelope<T> = self.client.get(&self.item_path(id)).await?;
        Ok(envelope.data)
    }

    pub async fn create<B: Serialize + ?Sized>(&self, record: &B) -> Result<T, ApiError> {
        let envelope: Envelope<T> = self.client.post(&self.path, record).await?;
        Ok(envelope.data)
    }

    pub async fn update<B: Serialize + ?Sized>(&self, id: impl Display, record: &B) -> Result<T, ApiError> {
        let envelope: Envelope<T> = self.client.put(&self.item_path(id), record).await?;
        Ok(envelope.data)
    }

    pub async fn delete(&self, id: impl Display) -> Result<(), ApiError> {
        self.client.delete(&self.item_path(id)).await
    }
}
