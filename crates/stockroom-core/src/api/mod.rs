//! REST API client module for the Stockroom backend.
//!
//! This module provides the `ApiClient` transport, which stamps every
//! request with the stored bearer token and classifies failures into
//! `ApiError`. A 401 response is reported to the registered
//! `SessionObserver` before the error reaches the caller.

pub mod client;
pub mod error;
pub mod models;
pub mod resource;

pub use client::{ApiClient, SessionObserver};
pub use error::{ApiError, ConnectionKind};
pub use resource::{Collection, Resource};
