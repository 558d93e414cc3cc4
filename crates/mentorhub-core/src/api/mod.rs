//! REST API client module for the mentorhub backend.
//!
//! This module provides the `ApiClient` for talking to the mentoring
//! platform's API: students, invitations, phase templates and tenants.
//!
//! Requests carry the access token from the current execution context as a
//! bearer token. Expired tokens are refreshed once per client and queued
//! requests are replayed with the new token.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod refresh;
pub mod request;

pub use client::{ApiClient, ExecutionContext, SessionTeardown, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use endpoints::DEFAULT_PAGE_LIMIT;
pub use error::{ApiError, ErrorBody, TOKEN_EXPIRED_CODE};
pub use refresh::RefreshCoordinator;
pub use request::{ApiRequest, ApiResponse};
