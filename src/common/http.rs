//! HTTP collaborator consumed by the DAV layer.
//!
//! The core never talks to hyper directly: every outbound call goes through
//! the [`HttpTransport`] trait so the DAV codec, discovery, and sync engine
//! can be exercised against a scripted transport in tests. The production
//! implementation, [`HyperTransport`], is built on hyper 1.x + rustls with
//! HTTP/2 multiplexing, connection pooling, and automatic response
//! decompression (br/zstd/gzip).

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::{BodyStream, Full};
use hyper::body::Incoming;
use hyper::{HeaderMap, Method, Request, StatusCode, Uri, header};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use tokio::io::{AsyncBufRead, AsyncReadExt, BufReader};
use tokio::time::{Duration, timeout};
use tokio_util::io::StreamReader;
use url::Url;

use crate::error::{DavError, Result};

/// Type alias for the hyper client shared across the DAV modules.
pub type HyperClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

const MAX_REDIRECTS: usize = 10;

/// Request envelope handed to the transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// When false, 3xx responses are returned verbatim so the caller can
    /// inspect `Location` itself (service discovery relies on this).
    pub follow_redirects: bool,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            follow_redirects: true,
        }
    }
}

/// Response envelope produced by the transport. The body is always fully
/// aggregated and already decompressed.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL the response was served from (after any followed redirects).
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The async HTTP contract the DAV core consumes.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Supported response content encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Br,
    Gzip,
    Zstd,
}

/// Insert an `Accept-Encoding` header (`br, zstd, gzip`) if not already present.
pub fn add_accept_encoding(headers: &mut HeaderMap) {
    if !headers.contains_key(header::ACCEPT_ENCODING) {
        headers.insert(
            header::ACCEPT_ENCODING,
            header::HeaderValue::from_static("br, zstd, gzip"),
        );
    }
}

/// Map the response `Content-Encoding` header to the decoder chain to apply.
///
/// Encodings are listed in the order the server applied them; unknown tokens
/// and `identity` are skipped.
pub fn detect_encodings(headers: &HeaderMap) -> Vec<ContentEncoding> {
    let Some(value) = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
    else {
        return Vec::new();
    };
    value
        .split(',')
        .filter_map(|token| match token.trim().to_ascii_lowercase().as_str() {
            "br" => Some(ContentEncoding::Br),
            "gzip" => Some(ContentEncoding::Gzip),
            "zstd" | "zst" => Some(ContentEncoding::Zstd),
            _ => None,
        })
        .collect()
}

/// Aggregate and decompress a response body, unwinding the encodings in
/// reverse application order.
pub async fn decompress_body(body: Incoming, encodings: &[ContentEncoding]) -> Result<Bytes> {
    use async_compression::tokio::bufread::{BrotliDecoder, GzipDecoder, ZstdDecoder};

    let stream = BodyStream::new(body)
        .map_ok(|frame| frame.into_data().unwrap_or_default())
        .map_err(std::io::Error::other);
    let mut reader: Box<dyn AsyncBufRead + Unpin + Send> =
        Box::new(BufReader::new(StreamReader::new(stream)));
    for encoding in encodings.iter().rev() {
        reader = match encoding {
            ContentEncoding::Br => Box::new(BufReader::new(BrotliDecoder::new(reader))),
            ContentEncoding::Gzip => Box::new(BufReader::new(GzipDecoder::new(reader))),
            ContentEncoding::Zstd => Box::new(BufReader::new(ZstdDecoder::new(reader))),
        };
    }

    let mut out = Vec::with_capacity(32 * 1024);
    reader
        .read_to_end(&mut out)
        .await
        .map_err(DavError::transport)?;
    Ok(Bytes::from(out))
}

/// Build a hyper client configured with HTTP/2, connection pooling, and a TLS
/// connector that prefers native roots but falls back to the bundled WebPKI
/// store.
pub fn build_hyper_client() -> Result<HyperClient> {
    let https_builder = HttpsConnectorBuilder::new()
        .with_native_roots()
        .unwrap_or_else(|err| {
            #[cfg(debug_assertions)]
            eprintln!("dav-sync-rs: falling back to webpki roots (native roots unavailable: {err})");
            HttpsConnectorBuilder::new().with_webpki_roots()
        });

    let https = https_builder
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    Ok(Client::builder(TokioExecutor::new())
        .http2_adaptive_window(true)
        .pool_max_idle_per_host(128)
        .build::<_, Full<Bytes>>(https))
}

/// Production transport on hyper 1.x + rustls.
///
/// Cloning is cheap and reuses the same connection pool.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
    default_timeout: Duration,
}

impl HyperTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_hyper_client()?,
            default_timeout: Duration::from_secs(20),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

#[async_trait]
impl HttpTransport for HyperTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut url = request.url.clone();
        let mut redirects = 0usize;

        loop {
            let uri: Uri = url
                .parse()
                .map_err(|err| DavError::Transport(format!("invalid request url {url:?}: {err}")))?;

            let mut headers = request.headers.clone();
            add_accept_encoding(&mut headers);

            let mut builder = Request::builder().method(request.method.clone()).uri(uri);
            for (name, value) in headers.iter() {
                builder = builder.header(name, value);
            }
            let req = builder
                .body(Full::new(request.body.clone().unwrap_or_default()))
                .map_err(DavError::transport)?;

            let fut = self.client.request(req);
            let resp = timeout(self.default_timeout, fut)
                .await
                .map_err(|_| DavError::Transport("request timed out".into()))?
                .map_err(DavError::transport)?;

            if request.follow_redirects
                && resp.status().is_redirection()
                && redirects < MAX_REDIRECTS
                && let Some(location) = resp
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
            {
                url = Url::parse(&url)?.join(location)?.to_string();
                redirects += 1;
                continue;
            }

            let encodings = detect_encodings(resp.headers());
            let (parts, body) = resp.into_parts();
            let body = decompress_body(body, &encodings).await?;

            return Ok(HttpResponse {
                url,
                status: parts.status,
                headers: parts.headers,
                body,
            });
        }
    }
}
