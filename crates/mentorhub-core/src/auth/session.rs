//! Session store: the signed-in identity and its lifecycle.
//!
//! The store owns the identity, persists the Credential Pair through the
//! client's credential store, and keeps sibling tabs in step over the `auth`
//! channel. A remote `signOut` is applied locally without being posted
//! again, so two tabs never echo sign-outs back and forth.

use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::channel::{AuthChannel, AuthMessage};
use crate::api::{ApiClient, ApiError, ApiRequest, ErrorBody, SessionTeardown};
use crate::models::{SignInRequest, SignInResponse, User};
use crate::navigation::{Navigator, ROOT_ROUTE, SIGN_IN_ROUTE};

/// Backend messages that mean the sign-in form was filled in wrong.
const INVALID_CREDENTIALS_MESSAGES: [&str; 2] = ["Invalid credentials.", "Validation error."];

fn is_invalid_credentials_message(message: Option<&str>) -> bool {
    message.is_some_and(|m| INVALID_CREDENTIALS_MESSAGES.contains(&m))
}

/// Point-in-time view of the session for front ends.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading_auth: bool,
    pub is_invalid_credentials: bool,
}

#[derive(Debug)]
struct SessionState {
    user: Option<User>,
    is_loading_auth: bool,
    is_invalid_credentials: bool,
    resolution_started: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            is_loading_auth: true,
            is_invalid_credentials: false,
            resolution_started: false,
        }
    }
}

pub struct SessionStore {
    api: ApiClient,
    channel: AuthChannel,
    navigator: Arc<dyn Navigator>,
    state: RwLock<SessionState>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    /// Create the store and register it with the client for teardown on
    /// unrecoverable auth failures.
    pub fn new(api: ApiClient, channel: AuthChannel, navigator: Arc<dyn Navigator>) -> Arc<Self> {
        let store = Arc::new(Self {
            api,
            channel,
            navigator,
            state: RwLock::new(SessionState::default()),
            listener: Mutex::new(None),
        });
        let teardown: Weak<dyn SessionTeardown> = Arc::downgrade(&store) as Weak<dyn SessionTeardown>;
        store.api.attach_session(teardown);
        store
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    // ===== State accessors =====

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            user: state.user.clone(),
            is_authenticated: state.user.is_some(),
            is_loading_auth: state.is_loading_auth,
            is_invalid_credentials: state.is_invalid_credentials,
        }
    }

    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.user.is_some()
    }

    pub async fn is_loading_auth(&self) -> bool {
        self.state.read().await.is_loading_auth
    }

    pub async fn is_invalid_credentials(&self) -> bool {
        self.state.read().await.is_invalid_credentials
    }

    pub async fn set_invalid_credentials(&self, value: bool) {
        self.state.write().await.is_invalid_credentials = value;
    }

    // ===== Lifecycle =====

    /// Resolve the identity behind a stored token. Runs once per store;
    /// later calls return immediately.
    pub async fn resolve(&self) {
        {
            let mut state = self.state.write().await;
            if state.resolution_started {
                return;
            }
            state.resolution_started = true;
        }

        if self.api.credentials().access_token().is_none() {
            debug!("No stored token, skipping identity check");
            self.state.write().await.is_loading_auth = false;
            return;
        }

        match self.api.fetch_me().await {
            Ok(user) => {
                info!(user_id = %user.id, role = %user.role, "Session restored");
                self.state.write().await.user = Some(user);
            }
            Err(e) => {
                warn!(error = %e, "Could not confirm stored session");
                // Skip when the client already tore the session down
                if self.has_stored_credentials() {
                    self.sign_out(false).await;
                }
            }
        }

        self.state.write().await.is_loading_auth = false;
    }

    fn has_stored_credentials(&self) -> bool {
        let stored = self.api.credentials().read();
        stored.access_token.is_some() || stored.refresh_token.is_some()
    }

    /// Sign in with email and password.
    ///
    /// Rejected credentials are not an error: the invalid-credentials flag is
    /// raised and nothing else changes. Transport failures and unexpected
    /// statuses are returned as errors.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post("/sessions").json(&SignInRequest { email, password })?;
        let response = self.api.dispatch_public(&request).await?;

        if !response.is_success() {
            let body = ErrorBody::parse(&response.body);
            if is_invalid_credentials_message(body.message.as_deref()) {
                info!(status = response.status.as_u16(), "Sign-in rejected");
                self.set_invalid_credentials(true).await;
                return Ok(());
            }
            return Err(ApiError::from_status(response.status, &response.body));
        }

        let payload: SignInResponse = response.json()?;
        let credentials = payload.credentials();
        self.api
            .credentials()
            .store(&credentials)
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        self.api.set_default_token(Some(credentials.access_token));

        let user = payload.user(email);
        info!(user_id = %user.id, role = %user.role, "Signed in");
        {
            let mut state = self.state.write().await;
            state.user = Some(user);
            state.is_invalid_credentials = false;
            state.is_loading_auth = false;
        }

        self.channel.post(AuthMessage::SignIn);
        self.navigator.push(ROOT_ROUTE);
        Ok(())
    }

    /// Tear the session down. Safe to call when already signed out.
    ///
    /// A local sign-out is posted to sibling tabs and returns this tab to the
    /// sign-in page. A remote one only clears local state.
    pub async fn sign_out(&self, originated_remotely: bool) {
        if let Err(e) = self.api.credentials().clear() {
            warn!(error = %e, "Failed to clear stored credentials");
        }
        self.api.set_default_token(None);
        self.state.write().await.user = None;

        if originated_remotely {
            info!("Signed out by another tab");
            return;
        }

        info!("Signed out");
        self.channel.post(AuthMessage::SignOut);
        self.navigator.push(SIGN_IN_ROUTE);
    }

    /// Start following sign-in/sign-out events from sibling tabs. Calling it
    /// again replaces the previous listener.
    pub fn listen(self: &Arc<Self>) {
        let mut subscription = self.channel.subscribe();
        let store = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                let Some(store) = store.upgrade() else { break };
                match message {
                    AuthMessage::SignOut => store.sign_out(true).await,
                    AuthMessage::SignIn => debug!("Another tab signed in"),
                }
            }
        });

        let mut slot = self
            .listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }
}

#[async_trait]
impl SessionTeardown for SessionStore {
    async fn sign_out(&self, originated_remotely: bool) {
        SessionStore::sign_out(self, originated_remotely).await;
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        let mut slot = self
            .listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}
