mod common;

use hyper::HeaderMap;

use common::MockTransport;
use dav_sync_rs::{AuthProvider, Credentials, DavError, OAuthConfig, OAuthTokens};

fn oauth_config() -> OAuthConfig {
    OAuthConfig {
        token_url: "https://auth.ex.com/token".into(),
        client_id: "client-1".into(),
        client_secret: "hunter2".into(),
        authorization_code: "code-xyz".into(),
        redirect_url: "https://app.ex.com/callback".into(),
        tokens: OAuthTokens::default(),
    }
}

#[tokio::test]
async fn basic_credentials_produce_base64_header() {
    let transport = MockTransport::new();
    let provider = AuthProvider::new(Some(Credentials::basic("user", "pass")));

    let mut headers = HeaderMap::new();
    provider
        .apply(&mut headers, &*transport)
        .await
        .expect("applies");

    assert_eq!(
        headers.get("authorization").and_then(|v| v.to_str().ok()),
        Some("Basic dXNlcjpwYXNz")
    );
    // no token endpoint traffic for basic auth
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn no_credentials_means_no_header() {
    let transport = MockTransport::new();
    let provider = AuthProvider::new(None);

    let mut headers = HeaderMap::new();
    provider
        .apply(&mut headers, &*transport)
        .await
        .expect("applies");
    assert!(headers.get("authorization").is_none());
}

#[tokio::test]
async fn oauth_missing_fields_are_listed() {
    let transport = MockTransport::new();
    let config = OAuthConfig {
        token_url: "https://auth.ex.com/token".into(),
        ..OAuthConfig::default()
    };
    let provider = AuthProvider::new(Some(Credentials::OAuth(config)));

    let mut headers = HeaderMap::new();
    let err = provider
        .apply(&mut headers, &*transport)
        .await
        .expect_err("incomplete config");
    match err {
        DavError::OAuthConfigMissing { fields } => {
            assert_eq!(
                fields,
                vec![
                    "client_id",
                    "client_secret",
                    "authorization_code",
                    "redirect_url"
                ]
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn first_use_exchanges_the_authorization_code() {
    let transport = MockTransport::new();
    transport.push_status(
        200,
        r#"{"access_token":"at-1","refresh_token":"rt-1","expires_in":3600}"#,
    );
    let provider = AuthProvider::new(Some(Credentials::OAuth(oauth_config())));

    let mut headers = HeaderMap::new();
    provider
        .apply(&mut headers, &*transport)
        .await
        .expect("applies");

    assert_eq!(
        headers.get("authorization").and_then(|v| v.to_str().ok()),
        Some("Bearer at-1")
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "https://auth.ex.com/token");
    let form = String::from_utf8_lossy(requests[0].body.as_ref().expect("form body")).into_owned();
    assert!(form.contains("grant_type=authorization_code"));
    assert!(form.contains("code=code-xyz"));
    assert!(form.contains("redirect_uri=https%3A%2F%2Fapp.ex.com%2Fcallback"));

    let tokens = provider.tokens().await;
    assert_eq!(tokens.access_token.as_deref(), Some("at-1"));
    assert_eq!(tokens.refresh_token.as_deref(), Some("rt-1"));
    assert!(tokens.expiration.is_some());
}

#[tokio::test]
async fn expired_token_refreshes_and_keeps_old_refresh_token() {
    let transport = MockTransport::new();
    transport.push_status(200, r#"{"access_token":"at-2","expires_in":3600}"#);

    let mut config = oauth_config();
    config.tokens = OAuthTokens {
        access_token: Some("at-stale".into()),
        refresh_token: Some("rt-1".into()),
        expiration: Some(1), // long past
    };
    let provider = AuthProvider::new(Some(Credentials::OAuth(config)));

    let mut headers = HeaderMap::new();
    provider
        .apply(&mut headers, &*transport)
        .await
        .expect("applies");

    assert_eq!(
        headers.get("authorization").and_then(|v| v.to_str().ok()),
        Some("Bearer at-2")
    );
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let form = String::from_utf8_lossy(requests[0].body.as_ref().expect("form body")).into_owned();
    assert!(form.contains("grant_type=refresh_token"));
    assert!(form.contains("refresh_token=rt-1"));

    // endpoint did not rotate the refresh token, the old one survives
    let tokens = provider.tokens().await;
    assert_eq!(tokens.refresh_token.as_deref(), Some("rt-1"));
}

#[tokio::test]
async fn valid_token_is_reused_without_traffic() {
    let transport = MockTransport::new();
    let mut config = oauth_config();
    config.tokens = OAuthTokens {
        access_token: Some("at-live".into()),
        refresh_token: Some("rt-1".into()),
        expiration: Some(i64::MAX),
    };
    let provider = AuthProvider::new(Some(Credentials::OAuth(config)));

    let mut headers = HeaderMap::new();
    provider
        .apply(&mut headers, &*transport)
        .await
        .expect("applies");

    assert_eq!(
        headers.get("authorization").and_then(|v| v.to_str().ok()),
        Some("Bearer at-live")
    );
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn token_without_expiration_never_refreshes() {
    let transport = MockTransport::new();
    let mut config = oauth_config();
    config.tokens = OAuthTokens {
        access_token: Some("at-forever".into()),
        refresh_token: Some("rt-1".into()),
        expiration: None,
    };
    let provider = AuthProvider::new(Some(Credentials::OAuth(config)));

    let mut headers = HeaderMap::new();
    provider
        .apply(&mut headers, &*transport)
        .await
        .expect("applies");
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn token_endpoint_failure_is_surfaced() {
    let transport = MockTransport::new();
    transport.push_status(400, r#"{"error":"invalid_grant"}"#);
    let provider = AuthProvider::new(Some(Credentials::OAuth(oauth_config())));

    let mut headers = HeaderMap::new();
    let err = provider
        .apply(&mut headers, &*transport)
        .await
        .expect_err("token endpoint rejected");
    match err {
        DavError::OAuthFetchFailed { status } => assert_eq!(status, 400),
        other => panic!("unexpected error: {other:?}"),
    }
}
