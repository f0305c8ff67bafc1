//! Object-level writes: conditional `PUT` and `DELETE`.
//!
//! These return the transport envelope untouched. A create is guarded with
//! `If-None-Match: *` so it never silently overwrites; an update or delete
//! carries `If-Match` with the etag in hand, or no guard when the caller has
//! none.

use bytes::Bytes;
use hyper::{Method, header};

use crate::common::http::HttpResponse;
use crate::error::{DavError, Result};
use crate::webdav::client::{WebDavClient, content_type_headers};

impl WebDavClient {
    /// Create a resource; fails with `412 Precondition Failed` if it exists.
    pub async fn create_object(
        &self,
        url: &str,
        data: impl Into<String>,
        content_type: &str,
    ) -> Result<HttpResponse> {
        let mut headers = content_type_headers(content_type)?;
        headers.insert(header::IF_NONE_MATCH, header::HeaderValue::from_static("*"));
        self.send(
            Method::PUT,
            url,
            headers,
            Some(Bytes::from(data.into())),
            true,
        )
        .await
    }

    /// Replace a resource. The `If-Match` guard is omitted when `etag` is
    /// absent.
    pub async fn update_object(
        &self,
        url: &str,
        data: impl Into<String>,
        etag: Option<&str>,
        content_type: &str,
    ) -> Result<HttpResponse> {
        let mut headers = content_type_headers(content_type)?;
        if let Some(etag) = etag.filter(|etag| !etag.is_empty()) {
            headers.insert(
                header::IF_MATCH,
                header::HeaderValue::from_str(etag).map_err(DavError::transport)?,
            );
        }
        self.send(
            Method::PUT,
            url,
            headers,
            Some(Bytes::from(data.into())),
            true,
        )
        .await
    }

    /// Delete a resource, guarded by `If-Match` when an etag is in hand.
    pub async fn delete_object(&self, url: &str, etag: Option<&str>) -> Result<HttpResponse> {
        let mut headers = hyper::HeaderMap::new();
        if let Some(etag) = etag.filter(|etag| !etag.is_empty()) {
            headers.insert(
                header::IF_MATCH,
                header::HeaderValue::from_str(etag).map_err(DavError::transport)?,
            );
        }
        self.send(Method::DELETE, url, headers, None, true).await
    }
}
