#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use mentorhub_core::api::{ApiClient, ExecutionContext};
use mentorhub_core::auth::{
    BroadcastHub, CookieJar, CredentialPair, CredentialStore, RequestCookies, SessionStore,
    AUTH_CHANNEL_NAME,
};
use mentorhub_core::navigation::RecordingNavigator;
use serde_json::json;
use wiremock::ResponseTemplate;

/// One browser tab: its client, session store and navigator.
pub struct Tab {
    pub api: ApiClient,
    pub session: Arc<SessionStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub jar: Arc<CookieJar>,
}

/// A browser profile: one cookie jar directory and one channel hub.
pub struct Profile {
    pub dir: tempfile::TempDir,
    pub hub: BroadcastHub,
}

impl Profile {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let hub = BroadcastHub::for_profile(dir.path().to_path_buf());
        Self { dir, hub }
    }

    /// A hub for a second process on this profile.
    pub fn other_process(&self) -> BroadcastHub {
        BroadcastHub::for_profile(self.dir.path().to_path_buf())
    }

    pub fn with_credentials(access: &str, refresh: &str) -> Self {
        let profile = Self::new();
        CookieJar::new(profile.dir.path().to_path_buf())
            .store(&CredentialPair::new(access, refresh))
            .expect("seed credentials");
        profile
    }

    pub fn jar(&self) -> Arc<CookieJar> {
        Arc::new(CookieJar::new(self.dir.path().to_path_buf()))
    }

    pub fn open_tab(&self, base_url: &str) -> Tab {
        self.open_tab_on(base_url, &self.hub)
    }

    pub fn open_tab_on(&self, base_url: &str, hub: &BroadcastHub) -> Tab {
        let jar = self.jar();
        let api = ApiClient::new(
            base_url,
            ExecutionContext::Browser,
            jar.clone(),
            Duration::from_secs(5),
        )
        .expect("client");
        let navigator = Arc::new(RecordingNavigator::new());
        let session = SessionStore::new(
            api.clone(),
            hub.open(AUTH_CHANNEL_NAME),
            navigator.clone(),
        );
        Tab {
            api,
            session,
            navigator,
            jar,
        }
    }
}

pub fn server_client(base_url: &str, cookie_header: &str) -> (ApiClient, Arc<RequestCookies>) {
    let cookies = Arc::new(RequestCookies::from_header(cookie_header));
    let api = ApiClient::new(
        base_url,
        ExecutionContext::Server,
        cookies.clone(),
        Duration::from_secs(5),
    )
    .expect("client");
    (api, cookies)
}

pub fn token_expired() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({
        "code": "token.expired",
        "message": "Token expired."
    }))
}

pub fn refreshed(token: &str, refresh_token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "token": token,
        "refreshToken": refresh_token
    }))
}

pub fn me_body(id: &str) -> serde_json::Value {
    json!({
        "user": {
            "id": id,
            "name": "Ana Souza",
            "email": "ana@example.com",
            "role": "MENTOR",
            "avatar": null,
            "createdAt": "2025-01-10T12:00:00Z",
            "userTenants": [
                {"tenantId": "t1", "tenant": {"id": "t1", "name": "Mentoria", "description": null, "ownerId": id}}
            ]
        }
    })
}

pub fn students_body(page: u32) -> serde_json::Value {
    json!({
        "students": [],
        "pagination": {"total": 0, "page": page, "limit": 10, "totalPages": 0}
    })
}

/// Poll until `check` holds or the deadline passes.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
