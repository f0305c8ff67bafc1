//! Account bootstrap: `.well-known` probe, principal lookup, home-set lookup.
//!
//! The three steps are strictly sequential since each consumes the previous
//! output. Only the `.well-known` probe is allowed to fail: any error there
//! degrades to `root_url = server_url` and discovery continues.

use hyper::{HeaderMap, header};
use url::Url;

use crate::common::url::{resolve_href, url_contains};
use crate::error::{DavError, Result};
use crate::webdav::client::{WebDavClient, dav_method};
use crate::webdav::parser::PropValue;
use crate::webdav::types::{AccountType, DavAccount, Depth};
use crate::webdav::xml::{DavNamespace, el};

impl WebDavClient {
    /// Probe `/.well-known/{caldav|carddav}` with redirects disabled.
    ///
    /// A 3xx `Location` is resolved against the original endpoint, keeping
    /// the original scheme, and the original port when the redirect names
    /// the same host without one. Every failure path returns `server_url`.
    pub async fn service_discovery(
        &self,
        account_type: AccountType,
        server_url: &str,
    ) -> Result<String> {
        let endpoint = Url::parse(server_url.trim())?;

        match self.well_known_probe(account_type, &endpoint).await {
            Ok(Some(root_url)) => Ok(root_url),
            Ok(None) => Ok(endpoint.to_string()),
            Err(err) => {
                tracing::debug!(error = %err, "discovery.well_known_failed");
                Ok(endpoint.to_string())
            }
        }
    }

    async fn well_known_probe(
        &self,
        account_type: AccountType,
        endpoint: &Url,
    ) -> Result<Option<String>> {
        let well_known = endpoint.join(&format!("/.well-known/{}", account_type.as_str()))?;

        let mut headers = HeaderMap::new();
        headers.insert("depth", header::HeaderValue::from_static("0"));
        let response = self
            .send(
                dav_method("PROPFIND")?,
                well_known.as_str(),
                headers,
                None,
                false,
            )
            .await?;

        if !response.status.is_redirection() {
            return Ok(None);
        }
        let Some(location) = response.header(header::LOCATION.as_str()) else {
            return Ok(None);
        };

        let mut target = endpoint.join(location)?;
        if target.host_str() == endpoint.host_str()
            && target.port().is_none()
            && endpoint.port().is_some()
        {
            let _ = target.set_port(endpoint.port());
        }
        if target.scheme() != endpoint.scheme() {
            let _ = target.set_scheme(endpoint.scheme());
        }
        tracing::debug!(root = %target, "discovery.well_known_redirect");
        Ok(Some(target.to_string()))
    }

    /// `current-user-principal` of the authenticated user, resolved against
    /// the root URL. A 401 here means the credentials are bad.
    pub async fn fetch_principal_url(&self, root_url: &str) -> Result<String> {
        let result = self
            .propfind(
                root_url,
                vec![el("current-user-principal")],
                Depth::Zero,
                &[DavNamespace::Dav],
            )
            .await?;

        let Some(response) = result.responses.first() else {
            return resolve_href(root_url, "");
        };
        if !response.ok && response.status == 401 {
            return Err(DavError::InvalidCredentials);
        }

        let href = response
            .prop("currentUserPrincipal")
            .and_then(|principal| principal.get("href"))
            .and_then(PropValue::scalar_string)
            .unwrap_or_default();
        resolve_href(root_url, &href)
    }

    /// The principal's calendar or address-book home set, resolved against
    /// the root URL.
    pub async fn fetch_home_url(
        &self,
        account_type: AccountType,
        principal_url: &str,
        root_url: &str,
    ) -> Result<String> {
        let (prop, key, namespaces) = match account_type {
            AccountType::CalDav => (
                el("c:calendar-home-set"),
                "calendarHomeSet",
                [DavNamespace::Dav, DavNamespace::CalDav],
            ),
            AccountType::CardDav => (
                el("card:addressbook-home-set"),
                "addressbookHomeSet",
                [DavNamespace::Dav, DavNamespace::CardDav],
            ),
        };

        let result = self
            .propfind(principal_url, vec![prop], Depth::Zero, &namespaces)
            .await?;

        let matched = result
            .responses
            .iter()
            .find(|response| {
                response
                    .href
                    .as_deref()
                    .is_some_and(|href| url_contains(principal_url, href))
            })
            .ok_or_else(|| DavError::HomeUrlNotFound {
                principal: principal_url.to_string(),
            })?;

        let href = matched
            .prop(key)
            .and_then(|home| home.get("href"))
            .map(PropValue::as_list)
            .unwrap_or_default()
            .first()
            .and_then(|first| first.scalar_string())
            .ok_or_else(|| DavError::HomeUrlNotFound {
                principal: principal_url.to_string(),
            })?;

        resolve_href(root_url, &href)
    }

    /// Run the full discovery sequence for a fresh account.
    pub async fn discover_account(
        &self,
        account_type: AccountType,
        server_url: &str,
    ) -> Result<DavAccount> {
        let root_url = self.service_discovery(account_type, server_url).await?;
        tracing::debug!(root = %root_url, "discovery.root");
        let principal_url = self.fetch_principal_url(&root_url).await?;
        tracing::debug!(principal = %principal_url, "discovery.principal");
        let home_url = self
            .fetch_home_url(account_type, &principal_url, &root_url)
            .await?;
        tracing::debug!(home = %home_url, "discovery.home");

        Ok(DavAccount {
            account_type,
            server_url: server_url.to_string(),
            root_url,
            principal_url,
            home_url,
        })
    }
}
