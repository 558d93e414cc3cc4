mod common;

use std::time::Duration;

use futures::future::join_all;
use mentorhub_core::api::ApiError;
use mentorhub_core::auth::{
    AuthMessage, CredentialPair, CredentialReader, CredentialStore, AUTH_CHANNEL_NAME,
};
use mentorhub_core::navigation::SIGN_IN_ROUTE;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{refreshed, server_client, students_body, token_expired, Profile};

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_replayed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tenants/t1/invitations"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(token_expired())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/token/refresh"))
        .and(body_json(json!({"refreshToken": "R1"})))
        .respond_with(refreshed("T2", "R2"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tenants/t1/invitations"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"invitations": []})))
        .expect(1)
        .mount(&server)
        .await;

    let profile = Profile::with_credentials("T1", "R1");
    let tab = profile.open_tab(&server.uri());

    let invitations = tab.api.fetch_invitations("t1").await.expect("replayed request");
    assert!(invitations.is_empty());

    assert_eq!(tab.jar.read().pair(), Some(CredentialPair::new("T2", "R2")));
    assert_eq!(tab.api.default_token().as_deref(), Some("T2"));
    assert!(!tab.api.is_refreshing().await);
    assert!(tab.navigator.routes().is_empty());
}

#[tokio::test]
async fn test_concurrent_expiries_share_one_refresh() {
    let server = MockServer::start().await;
    const REQUESTS: u32 = 5;

    Mock::given(method("GET"))
        .and(path("/tenants/t1/students"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(token_expired())
        .expect(u64::from(REQUESTS))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/token/refresh"))
        .respond_with(refreshed("T2", "R2").set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tenants/t1/students"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(students_body(1)))
        .expect(u64::from(REQUESTS))
        .mount(&server)
        .await;

    let profile = Profile::with_credentials("T1", "R1");
    let tab = profile.open_tab(&server.uri());

    let results = join_all((1..=REQUESTS).map(|page| tab.api.fetch_students("t1", page, 10))).await;
    for result in results {
        result.expect("every request succeeds after the refresh");
    }

    let requests = server.received_requests().await.expect("recording enabled");
    let refresh_calls = requests
        .iter()
        .filter(|r| r.url.path() == "/token/refresh")
        .count();
    assert_eq!(refresh_calls, 1);
    assert_eq!(tab.jar.access_token().as_deref(), Some("T2"));
}

#[tokio::test]
async fn test_failed_refresh_fails_queue_and_signs_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tenants/t1/invitations"))
        .respond_with(token_expired())
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/token/refresh"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"message": "Invalid refresh token."}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let profile = Profile::with_credentials("T1", "R1");
    let tab = profile.open_tab(&server.uri());
    let mut observer = profile.hub.open(AUTH_CHANNEL_NAME).subscribe();

    let (r1, r2) = tokio::join!(
        tab.api.fetch_invitations("t1"),
        tab.api.fetch_invitations("t1")
    );
    assert!(matches!(r1, Err(ApiError::RefreshFailed(_))));
    assert!(matches!(r2, Err(ApiError::RefreshFailed(_))));

    // Session torn down before the failures were reported
    assert_eq!(tab.jar.read().pair(), None);
    assert!(!tab.session.is_authenticated().await);
    assert_eq!(tab.navigator.last().as_deref(), Some(SIGN_IN_ROUTE));
    assert_eq!(observer.recv().await, Some(AuthMessage::SignOut));
    assert!(!tab.api.is_refreshing().await);
}

#[tokio::test]
async fn test_rejected_replay_tears_down_session() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tenants/t1/invitations"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(token_expired())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/token/refresh"))
        .respond_with(refreshed("T2", "R2"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tenants/t1/invitations"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Unknown user."})))
        .expect(1)
        .mount(&server)
        .await;

    let profile = Profile::with_credentials("T1", "R1");
    let tab = profile.open_tab(&server.uri());
    let mut observer = profile.hub.open(AUTH_CHANNEL_NAME).subscribe();

    let result = tab.api.fetch_invitations("t1").await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert_eq!(tab.jar.read().pair(), None);
    assert!(!tab.session.is_authenticated().await);
    assert_eq!(tab.navigator.routes(), vec![SIGN_IN_ROUTE.to_string()]);
    assert_eq!(observer.recv().await, Some(AuthMessage::SignOut));
}

#[tokio::test]
async fn test_replay_server_error_keeps_refreshed_pair() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tenants/t1/invitations"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(token_expired())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/token/refresh"))
        .respond_with(refreshed("T2", "R2"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tenants/t1/invitations"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let profile = Profile::with_credentials("T1", "R1");
    let tab = profile.open_tab(&server.uri());

    let result = tab.api.fetch_invitations("t1").await;

    assert!(matches!(result, Err(ApiError::ServerError(_))));
    assert_eq!(tab.jar.read().pair(), Some(CredentialPair::new("T2", "R2")));
    assert!(tab.navigator.routes().is_empty());
    // Session state untouched by a server failure
    let snapshot = tab.session.snapshot().await;
    assert!(snapshot.is_loading_auth);
    assert!(snapshot.user.is_none());
}

#[tokio::test]
async fn test_other_unauthorized_skips_refresh_in_browser() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Session revoked."})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/token/refresh"))
        .respond_with(refreshed("T2", "R2"))
        .expect(0)
        .mount(&server)
        .await;

    let profile = Profile::with_credentials("T1", "R1");
    let tab = profile.open_tab(&server.uri());

    let result = tab.api.fetch_me().await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert_eq!(tab.jar.read().pair(), None);
    assert_eq!(tab.navigator.routes(), vec![SIGN_IN_ROUTE.to_string()]);
}

#[tokio::test]
async fn test_other_unauthorized_is_auth_token_error_on_server() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Malformed token."})))
        .expect(1)
        .mount(&server)
        .await;

    let (api, cookies) = server_client(&server.uri(), "uvs.token=T1; uvs.refreshToken=R1");

    let result = api.fetch_me().await;
    assert!(matches!(result, Err(ApiError::AuthToken)));

    // Nothing is cleared on the server path; the caller redirects
    assert_eq!(cookies.read().pair(), Some(CredentialPair::new("T1", "R1")));
    assert!(cookies.set_cookie_headers().is_empty());
}

#[tokio::test]
async fn test_server_refresh_emits_set_cookie() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(token_expired())
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/token/refresh"))
        .respond_with(refreshed("T2", "R2"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::me_body("u1")))
        .mount(&server)
        .await;

    let (api, cookies) = server_client(&server.uri(), "uvs.token=T1; uvs.refreshToken=R1");

    let user = api.fetch_me().await.expect("replayed");
    assert_eq!(user.id, "u1");
    assert_eq!(
        cookies.set_cookie_headers(),
        vec![
            "uvs.token=T2; Max-Age=2592000; Path=/".to_string(),
            "uvs.refreshToken=R2; Max-Age=2592000; Path=/".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_server_errors_propagate_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/phase-templates/p1"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"message": "Try later."})))
        .expect(1)
        .mount(&server)
        .await;

    let profile = Profile::with_credentials("T1", "R1");
    let tab = profile.open_tab(&server.uri());

    let result = tab.api.delete_phase_template("p1").await;
    assert!(matches!(result, Err(ApiError::ServerError(ref m)) if m == "Try later."));
    // Session untouched
    assert_eq!(tab.jar.access_token().as_deref(), Some("T1"));
    assert!(tab.navigator.routes().is_empty());
}

#[tokio::test]
async fn test_expiry_after_foreign_refresh_reuses_new_token() {
    let server = MockServer::start().await;

    // The 401 for T1 arrives after another tab has already stored T2
    Mock::given(method("GET"))
        .and(path("/tenants/t1/phase-templates"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(token_expired().set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tenants/t1/phase-templates"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"phaseTemplates": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/token/refresh"))
        .respond_with(refreshed("T3", "R3"))
        .expect(0)
        .mount(&server)
        .await;

    let profile = Profile::with_credentials("T1", "R1");
    let tab = profile.open_tab(&server.uri());
    let other_tab_jar = profile.jar();

    let request = tab.api.fetch_phase_templates("t1", false);
    let foreign_refresh = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        other_tab_jar
            .store(&CredentialPair::new("T2", "R2"))
            .expect("store");
    };
    let (templates, ()) = tokio::join!(request, foreign_refresh);

    assert!(templates.expect("replayed with T2").is_empty());
    assert_eq!(tab.jar.read().pair(), Some(CredentialPair::new("T2", "R2")));
}
