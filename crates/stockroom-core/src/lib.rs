//! Core library for stockroom: the authenticated API transport, the session
//! lifecycle over securely stored credentials, and configuration.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;

pub use api::{ApiClient, ApiError, SessionObserver};
pub use auth::{AuthError, AuthState, Session};
pub use config::{ClientConfig, Config};
pub use context::AppContext;
