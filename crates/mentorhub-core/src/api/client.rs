//! Authenticated API client for the mentorhub backend.
//!
//! Every request resolves the access token from the execution context's
//! credential store at send time and attaches it as a bearer token. A `401`
//! whose body carries `code: "token.expired"` is recovered transparently:
//! one `/token/refresh` call runs per client, requests that expire while it
//! is in flight queue behind it, and each queued request is replayed once
//! with the new token. Any other `401` ends the session.

use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::refresh::RefreshCoordinator;
use super::request::{ApiRequest, ApiResponse};
use super::{ApiError, ErrorBody};
use crate::auth::{CredentialPair, CredentialStore};
use crate::models::{RefreshRequest, RefreshResponse};

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
/// Also bounds how long queued requests can wait on a hung refresh.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Refresh endpoint, called without going through expiry handling.
const REFRESH_PATH: &str = "/token/refresh";

/// Where the client runs, which decides how unrecoverable auth failures
/// are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Interactive front end with its own cookie jar. Auth failures tear
    /// the session down.
    Browser,
    /// Server-rendering pass. Nothing can navigate, so auth failures surface
    /// as [`ApiError::AuthToken`].
    Server,
}

/// Session teardown, implemented by the session store. The client only
/// holds a weak reference so the store can own the client.
#[async_trait]
pub trait SessionTeardown: Send + Sync {
    async fn sign_out(&self, originated_remotely: bool);
}

struct ClientInner {
    http: Client,
    base_url: String,
    context: ExecutionContext,
    credentials: Arc<dyn CredentialStore>,
    default_token: RwLock<Option<String>>,
    refresh: RefreshCoordinator,
    teardown: RwLock<Option<Weak<dyn SessionTeardown>>>,
}

/// API client for one execution context.
/// Clone is cheap and every clone shares the refresh state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Create a client seeded with whatever access token the credential
    /// store currently holds.
    pub fn new(
        base_url: &str,
        context: ExecutionContext,
        credentials: Arc<dyn CredentialStore>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        let seed = credentials.access_token();

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
                context,
                credentials,
                default_token: RwLock::new(seed),
                refresh: RefreshCoordinator::new(),
                teardown: RwLock::new(None),
            }),
        })
    }

    pub fn context(&self) -> ExecutionContext {
        self.inner.context
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.credentials
    }

    /// Register the session that should be torn down on auth failure.
    pub fn attach_session(&self, teardown: Weak<dyn SessionTeardown>) {
        if let Ok(mut slot) = self.inner.teardown.write() {
            *slot = Some(teardown);
        }
    }

    /// Token sent when the credential store has none.
    pub fn set_default_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.inner.default_token.write() {
            *slot = token;
        }
    }

    pub fn default_token(&self) -> Option<String> {
        self.inner
            .default_token
            .read()
            .ok()
            .and_then(|t| t.clone())
    }

    /// Token for the next request: the stored cookie first, since another
    /// tab or a concurrent refresh may have replaced it.
    pub fn current_token(&self) -> Option<String> {
        self.inner
            .credentials
            .access_token()
            .or_else(|| self.default_token())
    }

    /// True while a `/token/refresh` call is in flight.
    pub async fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing().await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    // ===== Transport =====

    /// Send once with an explicit token and read the whole body. Only
    /// transport failures are errors here.
    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<ApiResponse, ApiError> {
        let url = self.url(&request.path);

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), &url)
            .header(header::ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(method = %request.method, path = %request.path, status = status.as_u16(), "Response received");

        Ok(ApiResponse { status, body })
    }

    /// Send without a bearer token and without expiry handling, returning
    /// the response whatever its status.
    pub async fn dispatch_public(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.dispatch(request, None).await
    }

    /// Like [`Self::dispatch_public`] but non-success statuses are errors.
    /// Used for sign-up and invitation acceptance.
    pub async fn send_public(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.dispatch(request, None).await?.error_for_status()
    }

    /// Send an authenticated request, recovering from token expiry.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let token = self.current_token();
        let response = self.dispatch(request, token.as_deref()).await?;

        if response.is_success() {
            return Ok(response);
        }

        if response.status == reqwest::StatusCode::UNAUTHORIZED {
            if ErrorBody::parse(&response.body).is_token_expired() {
                return self.recover_expired(request, token).await;
            }
            return Err(self.unrecoverable(request).await);
        }

        Err(ApiError::from_status(response.status, &response.body))
    }

    /// Resend a request once with a specific token. The outcome is final:
    /// a `401` here, expired or not, ends the session like any other
    /// unrecoverable auth failure and never starts a second refresh.
    async fn replay(&self, request: &ApiRequest, token: &str) -> Result<ApiResponse, ApiError> {
        debug!(method = %request.method, path = %request.path, "Replaying request with refreshed token");
        let response = self.dispatch(request, Some(token)).await?;
        if response.status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(self.unrecoverable(request).await);
        }
        response.error_for_status()
    }

    async fn recover_expired(
        &self,
        request: &ApiRequest,
        sent_token: Option<String>,
    ) -> Result<ApiResponse, ApiError> {
        let ticket = self.inner.refresh.join().await;
        if ticket.must_start {
            match self.current_token() {
                // A refresh finished after this request left; reuse its token
                Some(current) if Some(&current) != sent_token.as_ref() => {
                    self.inner.refresh.settle(Ok(current)).await;
                }
                _ => {
                    let client = self.clone();
                    // Runs detached so a cancelled caller never strands the queue
                    tokio::spawn(async move {
                        client.run_refresh().await;
                    });
                }
            }
        }

        match ticket.outcome.await {
            Ok(Ok(token)) => self.replay(request, &token).await,
            Ok(Err(reason)) => Err(ApiError::RefreshFailed(reason)),
            Err(_) => Err(ApiError::RefreshFailed("refresh was abandoned".to_string())),
        }
    }

    /// Perform the single refresh call and settle the queue.
    async fn run_refresh(&self) {
        match self.request_new_credentials().await {
            Ok(pair) => {
                info!("Access token refreshed");
                self.inner.refresh.settle(Ok(pair.access_token)).await;
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                // Tear down first so failed callers observe a signed-out session
                if self.inner.context == ExecutionContext::Browser {
                    self.tear_down_session().await;
                }
                self.inner.refresh.settle(Err(e.to_string())).await;
            }
        }
    }

    async fn request_new_credentials(&self) -> Result<CredentialPair, ApiError> {
        let refresh_token = self
            .inner
            .credentials
            .refresh_token()
            .ok_or_else(|| ApiError::RefreshFailed("no refresh token stored".to_string()))?;

        let request = ApiRequest::patch(REFRESH_PATH).json(&RefreshRequest { refresh_token })?;
        let token = self.current_token();
        let response = self
            .dispatch(&request, token.as_deref())
            .await?
            .error_for_status()?;
        let pair: CredentialPair = response.json::<RefreshResponse>()?.into();

        self.inner
            .credentials
            .store(&pair)
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        self.set_default_token(Some(pair.access_token.clone()));
        Ok(pair)
    }

    async fn unrecoverable(&self, request: &ApiRequest) -> ApiError {
        match self.inner.context {
            ExecutionContext::Browser => {
                warn!(path = %request.path, "Unauthorized, ending session");
                self.tear_down_session().await;
                ApiError::Unauthorized
            }
            ExecutionContext::Server => {
                debug!(path = %request.path, "Unauthorized in server context");
                ApiError::AuthToken
            }
        }
    }

    async fn tear_down_session(&self) {
        let teardown = self
            .inner
            .teardown
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().and_then(Weak::upgrade));
        match teardown {
            Some(session) => session.sign_out(false).await,
            None => {
                // Nobody owns a session; at least drop the dead credentials
                if let Err(e) = self.inner.credentials.clear() {
                    warn!(error = %e, "Failed to clear credentials");
                }
                self.set_default_token(None);
            }
        }
    }

    // ===== Typed helpers =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(&ApiRequest::get(path)).await?.json()
    }

    pub async fn get_request<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.send(&request).await?.json()
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(&ApiRequest::post(path).json(body)?).await?.json()
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(&ApiRequest::put(path).json(body)?).await?.json()
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(&ApiRequest::patch(path).json(body)?).await?.json()
    }

    /// Send and discard the response body.
    pub async fn execute(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.send(&request).await.map(|_| ())
    }
}
