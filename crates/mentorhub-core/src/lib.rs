//! mentorhub core library.
//!
//! Session handling and API access for the mentorhub mentoring platform:
//! the authenticated HTTP client with single-flight token refresh, the
//! session store with cross-tab sign-out, credential storage for browser and
//! server contexts, domain models, and a local query cache.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod navigation;

pub use api::{ApiClient, ApiError, ExecutionContext};
pub use auth::{BroadcastHub, CookieJar, CredentialPair, RequestCookies, SessionStore};
pub use config::Config;
