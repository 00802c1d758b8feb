//! Authentication module for managing the user session and its credentials.
//!
//! This module provides:
//! - `Session`: bootstrap, login and logout over the stored credential pair
//! - `SecureStore`: encrypted key-value storage, backed by the OS keychain
//!
//! The stored `userToken` key is the single "logged in" sentinel.

pub mod credentials;
pub mod error;
pub mod session;

pub use credentials::{Credential, KeyringStore, MemoryStore, SecureStore, StoreError, ROLE_KEY, TOKEN_KEY};
pub use error::AuthError;
pub use session::{AuthState, Authenticator, Role, Session};
