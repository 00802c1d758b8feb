use std::collections::BTreeMap;

use reqwest::StatusCode;
use thiserror::Error;

use super::models::ValidationErrors;

/// Why a request never produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Timeout,
    Unreachable,
    Other,
}

impl ConnectionKind {
    pub fn message(self) -> &'static str {
        match self {
            ConnectionKind::Timeout => {
                "The request timed out. Check your connection and try again."
            }
            ConnectionKind::Unreachable => {
                "Unable to reach the server. Check your internet connection."
            }
            ConnectionKind::Other => "A network error occurred. Check your connection.",
        }
    }

    fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ConnectionKind::Timeout
        } else if err.is_connect() {
            ConnectionKind::Unreachable
        } else {
            ConnectionKind::Other
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{}", .kind.message())]
    Connection {
        kind: ConnectionKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unauthorized - session expired or invalid")]
    AuthenticationExpired,

    #[error("Validation failed ({status}): {}", .body.summary())]
    Validation {
        status: StatusCode,
        body: ValidationErrors,
    },

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid authorization header value")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Wrap a transport error raised before any response arrived.
    pub fn connection(source: reqwest::Error) -> Self {
        ApiError::Connection {
            kind: ConnectionKind::classify(&source),
            source,
        }
    }

    /// Classify a non-2xx response.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            return ApiError::AuthenticationExpired;
        }
        match serde_json::from_str::<ValidationErrors>(body) {
            Ok(parsed) if parsed.is_structured() => ApiError::Validation {
                status,
                body: parsed,
            },
            _ => ApiError::UnexpectedStatus {
                status,
                body: Self::truncate_body(body),
            },
        }
    }

    /// True when no response reached the client.
    pub fn is_connection(&self) -> bool {
        matches!(self, ApiError::Connection { .. })
    }

    pub fn is_authentication_expired(&self) -> bool {
        matches!(self, ApiError::AuthenticationExpired)
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::AuthenticationExpired => Some(StatusCode::UNAUTHORIZED),
            ApiError::Validation { status, .. } | ApiError::UnexpectedStatus { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Per-field messages for form display. Empty unless this is a validation failure.
    pub fn field_errors(&self) -> BTreeMap<String, Vec<String>> {
        match self {
            ApiError::Validation { body, .. } => body.by_field(),
            _ => BTreeMap::new(),
        }
    }

    /// Message suitable for showing to a person rather than a log.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Connection { kind, .. } => kind.message().to_string(),
            ApiError::AuthenticationExpired => {
                "Your session has expired or your credentials were rejected. Please sign in again."
                    .to_string()
            }
            ApiError::Validation { body, .. } => body.summary(),
            ApiError::UnexpectedStatus { status, .. } => {
                format!("The server returned an error ({}). Please try again.", status)
            }
            ApiError::InvalidResponse(_) => {
                "The server sent a response that could not be read.".to_string()
            }
            ApiError::InvalidHeader(_) => {
                "The stored session is unusable. Please sign in again.".to_string()
            }
            ApiError::ClientBuild(_) => "The HTTP client could not be initialized.".to_string(),
        }
    }
}
