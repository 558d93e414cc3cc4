//! Authentication module for managing sessions and credentials.
//!
//! This module provides:
//! - `SessionStore`: sign-in, sign-out and identity resolution
//! - `CookieJar` / `RequestCookies`: Credential Pair storage for the browser
//!   and server execution contexts
//! - `BroadcastHub` / `AuthChannel`: the cross-tab `auth` channel
//!
//! Tokens are kept in cookies for 30 days and replaced as a pair.

pub mod channel;
pub mod credentials;
pub mod session;

pub use channel::{AuthChannel, AuthMessage, AuthSubscription, BroadcastHub, AUTH_CHANNEL_NAME};
pub use credentials::{
    CookieJar, CredentialPair, CredentialReader, CredentialStore, RequestCookies,
    StoredCredentials, ACCESS_TOKEN_COOKIE, COOKIE_MAX_AGE_SECS, REFRESH_TOKEN_COOKIE,
};
pub use session::{SessionSnapshot, SessionStore};
