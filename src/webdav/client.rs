use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use hyper::{HeaderMap, Method, header};

use crate::common::auth::{AuthProvider, Credentials, OAuthTokens};
use crate::common::http::{HttpRequest, HttpResponse, HttpTransport, HyperTransport};
use crate::error::{DavError, Result};
use crate::webdav::parser::{Multistatus, parse_multistatus};
use crate::webdav::types::{DavRequest, Depth};
use crate::webdav::xml::{DavNamespace, XmlElement, el, render_document};

pub(crate) fn dav_method(name: &'static str) -> Result<Method> {
    Method::from_bytes(name.as_bytes())
        .map_err(|err| DavError::Transport(format!("invalid method {name}: {err}")))
}

/// WebDAV client: binds a transport, credentials, and an optional proxy
/// prefix to the request/response codec.
///
/// Cloning is cheap and shares the transport's connection pool and the OAuth
/// token state.
#[derive(Clone)]
pub struct WebDavClient {
    transport: Arc<dyn HttpTransport>,
    auth: Arc<AuthProvider>,
    proxy_url: Option<String>,
}

impl WebDavClient {
    /// Create a client on the production hyper/rustls transport.
    pub fn new(credentials: Option<Credentials>) -> Result<Self> {
        Ok(Self::with_transport(
            Arc::new(HyperTransport::new()?),
            credentials,
        ))
    }

    /// Create a client over a caller-supplied transport (tests script one).
    pub fn with_transport(
        transport: Arc<dyn HttpTransport>,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            transport,
            auth: Arc::new(AuthProvider::new(credentials)),
            proxy_url: None,
        }
    }

    /// Prefix every outbound URL with a proxy URL (plain string
    /// concatenation; the proxy forwards to the URL embedded in the suffix).
    pub fn with_proxy_url(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    /// Current OAuth tokens, for callers persisting them across sessions.
    pub async fn oauth_tokens(&self) -> OAuthTokens {
        self.auth.tokens().await
    }

    fn target_url(&self, url: &str) -> String {
        match &self.proxy_url {
            Some(proxy) => format!("{proxy}{url}"),
            None => url.to_string(),
        }
    }

    /// Low-level send: applies auth and the proxy prefix, nothing else.
    pub(crate) async fn send(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
        follow_redirects: bool,
    ) -> Result<HttpResponse> {
        let mut headers = headers;
        self.auth.apply(&mut headers, self.transport.as_ref()).await?;

        let target = self.target_url(url);
        tracing::debug!(method = %method, url = %target, "dav.request");

        let mut request = HttpRequest::new(method, target);
        request.headers = headers;
        request.body = body;
        request.follow_redirects = follow_redirects;
        self.transport.execute(request).await
    }

    /// Execute a structured DAV request and decode the multistatus response.
    ///
    /// `Content-Type: text/xml;charset=UTF-8` is merged under the caller's
    /// headers; a header set to `None` or the empty string is dropped. Never
    /// fails on a non-2xx status: those come back as the synthetic
    /// single-response envelope.
    pub async fn dav_request(&self, request: DavRequest) -> Result<Multistatus> {
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        headers.insert("content-type".into(), "text/xml;charset=UTF-8".into());
        if let Some(depth) = request.depth {
            headers.insert("depth".into(), depth.as_str().into());
        }
        for (name, value) in &request.headers {
            let name = name.to_ascii_lowercase();
            match value {
                Some(value) if !value.is_empty() => {
                    headers.insert(name, value.clone());
                }
                _ => {
                    headers.remove(&name);
                }
            }
        }

        let body = request.body.as_ref().map(|root| {
            let root = root.clone().namespaces(&request.namespaces);
            Bytes::from(render_document(&root, request.default_namespace))
        });

        let response = self
            .send(
                request.method.clone(),
                &request.url,
                to_header_map(&headers)?,
                body,
                true,
            )
            .await?;

        if !request.parse_response || !response.ok() {
            return Ok(Multistatus::synthetic(&response));
        }
        match parse_multistatus(
            &response.body,
            (response.status.as_u16(), response.status_text()),
        ) {
            Ok(multistatus) => Ok(multistatus),
            Err(err) => {
                tracing::trace!(error = %err, "dav.response_not_multistatus");
                Ok(Multistatus::synthetic(&response))
            }
        }
    }

    /// `PROPFIND` for a property set, names resolved against the default
    /// `d:` prefix unless explicitly namespaced.
    pub async fn propfind(
        &self,
        url: &str,
        props: Vec<XmlElement>,
        depth: Depth,
        namespaces: &[DavNamespace],
    ) -> Result<Multistatus> {
        let body = el("propfind").child(el("prop").children(props));
        self.dav_request(
            DavRequest::new(dav_method("PROPFIND")?, url)
                .depth(depth)
                .namespaces(namespaces)
                .body(body),
        )
        .await
    }

    /// `REPORT` with a caller-built body.
    pub async fn report(
        &self,
        url: &str,
        body: XmlElement,
        depth: Option<Depth>,
        namespaces: &[DavNamespace],
        default_namespace: Option<DavNamespace>,
    ) -> Result<Multistatus> {
        let mut request = DavRequest::new(dav_method("REPORT")?, url)
            .namespaces(namespaces)
            .body(body);
        request.default_namespace = default_namespace;
        if let Some(depth) = depth {
            request = request.depth(depth);
        }
        self.dav_request(request).await
    }
}

fn to_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = header::HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| DavError::Transport(format!("invalid header name {name:?}: {err}")))?;
        let value = header::HeaderValue::from_str(value).map_err(DavError::transport)?;
        map.insert(name, value);
    }
    Ok(map)
}

pub(crate) fn content_type_headers(content_type: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_str(content_type).map_err(DavError::transport)?,
    );
    Ok(headers)
}
