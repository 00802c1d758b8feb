use thiserror::Error;

use super::credentials::StoreError;
use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Login response carried no role claim")]
    MissingRole,

    #[error("Login response carried no token")]
    MissingToken,

    #[error(transparent)]
    Request(#[from] ApiError),

    #[error("Failed to persist credentials: {0}")]
    Storage(#[from] StoreError),
}

impl AuthError {
    /// Message suitable for a login form.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::MissingRole | AuthError::MissingToken => {
                "The server returned an incomplete login response. Please try again.".to_string()
            }
            AuthError::Request(ApiError::AuthenticationExpired) => {
                "Invalid username or password".to_string()
            }
            AuthError::Request(e) => e.user_message(),
            AuthError::Storage(_) => {
                "Could not save the session to secure storage. Please try again.".to_string()
            }
        }
    }
}
