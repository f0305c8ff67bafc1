//! Request authentication: Basic credentials or OAuth 2.0 tokens.
//!
//! OAuth state lives behind a mutex so concurrent requests with an expired
//! access token trigger exactly one token POST; the losers of the race reuse
//! the freshly fetched token.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use bytes::Bytes;
use hyper::{HeaderMap, Method, header};
use serde::Deserialize;
use tokio::sync::Mutex;
use url::form_urlencoded;

use crate::common::http::{HttpRequest, HttpTransport};
use crate::error::{DavError, Result, missing_fields};

/// Credentials for the DAV account.
#[derive(Debug, Clone)]
pub enum Credentials {
    Basic { username: String, password: String },
    OAuth(OAuthConfig),
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// OAuth 2.0 authorization-code configuration plus any tokens already held.
#[derive(Debug, Clone, Default)]
pub struct OAuthConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorization_code: String,
    pub redirect_url: String,
    /// Tokens from a previous session, if the caller persisted them.
    pub tokens: OAuthTokens,
}

/// Mutable OAuth token state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Expiry as epoch milliseconds. Absent means the token never expires.
    pub expiration: Option<i64>,
}

impl OAuthTokens {
    fn expired(&self, now_ms: i64) -> bool {
        self.access_token.is_none() || self.expiration.is_some_and(|exp| now_ms > exp)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Produces `Authorization` headers for outbound requests.
pub struct AuthProvider {
    credentials: Option<Credentials>,
    oauth_state: Mutex<OAuthTokens>,
}

impl AuthProvider {
    pub fn new(credentials: Option<Credentials>) -> Self {
        let seed = match &credentials {
            Some(Credentials::OAuth(config)) => config.tokens.clone(),
            _ => OAuthTokens::default(),
        };
        Self {
            credentials,
            oauth_state: Mutex::new(seed),
        }
    }

    /// Snapshot of the current OAuth tokens, for callers that persist them
    /// across sessions.
    pub async fn tokens(&self) -> OAuthTokens {
        self.oauth_state.lock().await.clone()
    }

    /// Apply the `Authorization` header for the configured credentials,
    /// fetching or refreshing OAuth tokens first when necessary.
    pub async fn apply(&self, headers: &mut HeaderMap, transport: &dyn HttpTransport) -> Result<()> {
        let value = match &self.credentials {
            None => return Ok(()),
            Some(Credentials::Basic { username, password }) => {
                let token = format!("{username}:{password}");
                format!("Basic {}", B64.encode(token))
            }
            Some(Credentials::OAuth(config)) => {
                let access = self.oauth_access_token(config, transport).await?;
                format!("Bearer {access}")
            }
        };
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&value).map_err(DavError::transport)?,
        );
        Ok(())
    }

    /// Single-flight token resolution: the lock is held across the token POST
    /// so concurrent expired callers fetch once.
    async fn oauth_access_token(
        &self,
        config: &OAuthConfig,
        transport: &dyn HttpTransport,
    ) -> Result<String> {
        let mut state = self.oauth_state.lock().await;
        let now = chrono::Utc::now().timestamp_millis();

        if state.refresh_token.is_none() {
            *state = fetch_oauth_tokens(config, transport).await?;
        } else if state.expired(now) {
            let refreshed = refresh_access_token(config, &state, transport).await?;
            *state = refreshed;
        }

        state
            .access_token
            .clone()
            .ok_or(DavError::OAuthFetchFailed { status: 0 })
    }
}

/// Exchange the authorization code for the first token pair
/// (`grant_type=authorization_code`).
pub async fn fetch_oauth_tokens(
    config: &OAuthConfig,
    transport: &dyn HttpTransport,
) -> Result<OAuthTokens> {
    missing_fields(&[
        ("token_url", !config.token_url.is_empty()),
        ("client_id", !config.client_id.is_empty()),
        ("client_secret", !config.client_secret.is_empty()),
        ("authorization_code", !config.authorization_code.is_empty()),
        ("redirect_url", !config.redirect_url.is_empty()),
    ])
    .map_err(|fields| DavError::OAuthConfigMissing { fields })?;

    let form = form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "authorization_code")
        .append_pair("code", &config.authorization_code)
        .append_pair("redirect_uri", &config.redirect_url)
        .append_pair("client_id", &config.client_id)
        .append_pair("client_secret", &config.client_secret)
        .finish();

    post_token_endpoint(&config.token_url, form, transport, None).await
}

/// Trade the refresh token for a new access token
/// (`grant_type=refresh_token`). The old refresh token is retained when the
/// endpoint does not rotate it.
pub async fn refresh_access_token(
    config: &OAuthConfig,
    current: &OAuthTokens,
    transport: &dyn HttpTransport,
) -> Result<OAuthTokens> {
    missing_fields(&[
        ("token_url", !config.token_url.is_empty()),
        ("client_id", !config.client_id.is_empty()),
        ("client_secret", !config.client_secret.is_empty()),
        ("refresh_token", current.refresh_token.is_some()),
    ])
    .map_err(|fields| DavError::OAuthConfigMissing { fields })?;

    let refresh_token = current.refresh_token.clone().unwrap_or_default();
    let form = form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "refresh_token")
        .append_pair("refresh_token", &refresh_token)
        .append_pair("client_id", &config.client_id)
        .append_pair("client_secret", &config.client_secret)
        .finish();

    post_token_endpoint(&config.token_url, form, transport, Some(refresh_token)).await
}

async fn post_token_endpoint(
    token_url: &str,
    form: String,
    transport: &dyn HttpTransport,
    retained_refresh_token: Option<String>,
) -> Result<OAuthTokens> {
    let mut request = HttpRequest::new(Method::POST, token_url);
    request.headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    request.headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json"),
    );
    request.body = Some(Bytes::from(form));

    tracing::debug!(url = %token_url, "oauth.token_request");
    let response = transport.execute(request).await?;
    if !response.ok() {
        return Err(DavError::OAuthFetchFailed {
            status: response.status.as_u16(),
        });
    }

    let parsed: TokenResponse = serde_json::from_slice(&response.body)
        .map_err(|err| DavError::Transport(format!("malformed oauth token response: {err}")))?;
    if parsed.access_token.is_none() {
        return Err(DavError::OAuthFetchFailed {
            status: response.status.as_u16(),
        });
    }

    let now = chrono::Utc::now().timestamp_millis();
    Ok(OAuthTokens {
        access_token: parsed.access_token,
        refresh_token: parsed.refresh_token.or(retained_refresh_token),
        expiration: parsed.expires_in.map(|secs| now + secs * 1000),
    })
}
