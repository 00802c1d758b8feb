//! Wire types for the auth endpoints and the shared response envelopes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Standard `{ "data": ... }` wrapper around successful payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub identifier: &'a str,
    pub secret: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForgotPasswordRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleClaim {
    pub authority: String,
}

/// Body of a successful login, after unwrapping the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPayload {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub roles: Vec<RoleClaim>,
}

impl LoginPayload {
    /// The role claim the session is keyed on: the first authority, if non-empty.
    pub fn primary_role(&self) -> Option<&str> {
        self.roles
            .first()
            .map(|r| r.authority.trim())
            .filter(|a| !a.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    #[serde(default)]
    pub descriptions: Vec<String>,
}

/// Error envelope the backend returns when a request fails validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    #[serde(default)]
    pub result: Vec<FieldError>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ValidationErrors {
    /// Whether the body actually carried any of the envelope's fields.
    pub fn is_structured(&self) -> bool {
        !self.result.is_empty() || self.title.is_some() || self.description.is_some()
    }

    pub fn by_field(&self) -> BTreeMap<String, Vec<String>> {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in &self.result {
            fields
                .entry(entry.field.clone())
                .or_default()
                .extend(entry.descriptions.iter().cloned());
        }
        fields
    }

    /// One-line summary: per-field messages when present, else the title/description banner.
    pub fn summary(&self) -> String {
        if !self.result.is_empty() {
            return self
                .by_field()
                .iter()
                .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
                .collect::<Vec<_>>()
                .join("; ");
        }
        match (self.title.as_deref(), self.description.as_deref()) {
            (Some(title), Some(description)) => format!("{}: {}", title, description),
            (Some(title), None) => title.to_string(),
            (None, Some(description)) => description.to_string(),
            (None, None) => "Request failed".to_string(),
        }
    }
}
