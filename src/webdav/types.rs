use hyper::Method;

use crate::webdav::xml::{DavNamespace, XmlElement};

/// WebDAV Depth
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Depth {
    pub fn as_str(self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "infinity",
        }
    }
}

/// Which DAV service an account talks to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccountType {
    CalDav,
    CardDav,
}

impl AccountType {
    /// The `.well-known` segment for this service (RFC 6764).
    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::CalDav => "caldav",
            AccountType::CardDav => "carddav",
        }
    }
}

/// A bootstrapped account: the URLs discovery resolved. Immutable once
/// created.
#[derive(Debug, Clone)]
pub struct DavAccount {
    pub account_type: AccountType,
    /// The URL the caller handed in.
    pub server_url: String,
    /// Where `.well-known` probing landed (falls back to `server_url`).
    pub root_url: String,
    /// `current-user-principal` of the authenticated user.
    pub principal_url: String,
    /// The calendar-home-set / addressbook-home-set collection.
    pub home_url: String,
}

/// What account bootstrap loads beyond discovery.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateAccountOptions {
    /// Fetch the calendar/address-book list.
    pub load_collections: bool,
    /// Also populate each collection's object snapshot (implies the list).
    pub load_objects: bool,
}

/// A member resource of a collection. `data` is the opaque iCalendar or
/// vCard payload; this crate never parses it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DavObject {
    pub url: String,
    /// The per-object change witness.
    pub etag: Option<String>,
    pub data: Option<String>,
}

/// A calendar or address-book collection plus the caller's local snapshot of
/// its member objects.
#[derive(Debug, Clone, Default)]
pub struct DavCollection {
    /// Absolute collection URL.
    pub url: String,
    /// Per-collection change witness when sync tokens are unavailable.
    pub ctag: Option<String>,
    /// WebDAV sync-collection cursor; preferred over `ctag` when the
    /// collection's reports include `syncCollection`.
    pub sync_token: Option<String>,
    pub display_name: Option<String>,
    /// Tags of the server's `resourcetype` (`collection`, `calendar`, ...).
    pub resource_type: Vec<String>,
    /// Supported report names, camelCased (`syncCollection`,
    /// `calendarMultiget`, ...).
    pub reports: Vec<String>,
    /// Local snapshot the sync engine diffs against.
    pub objects: Vec<DavObject>,
}

impl DavCollection {
    pub fn supports_sync_token(&self) -> bool {
        self.reports.iter().any(|report| report == "syncCollection")
    }
}

/// Structured description of one DAV request, consumed by
/// [`WebDavClient::dav_request`](crate::webdav::client::WebDavClient::dav_request).
#[derive(Debug, Clone)]
pub struct DavRequest {
    pub method: Method,
    pub url: String,
    pub depth: Option<Depth>,
    /// Header overrides merged over the defaults. A `None` or empty value
    /// *removes* the header, so callers can clear a default.
    pub headers: Vec<(String, Option<String>)>,
    /// Namespaces declared on the body's root element.
    pub namespaces: Vec<DavNamespace>,
    /// Prefix applied to body element names that carry none.
    pub default_namespace: Option<DavNamespace>,
    pub body: Option<XmlElement>,
    /// When false the response body is never XML-decoded and the synthetic
    /// single-envelope shape is returned.
    pub parse_response: bool,
}

impl DavRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            depth: None,
            headers: Vec::new(),
            namespaces: vec![DavNamespace::Dav],
            default_namespace: Some(DavNamespace::Dav),
            body: None,
            parse_response: true,
        }
    }

    pub fn depth(mut self, depth: Depth) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: Option<String>) -> Self {
        self.headers.push((name.into(), value));
        self
    }

    pub fn namespaces(mut self, namespaces: &[DavNamespace]) -> Self {
        self.namespaces = namespaces.to_vec();
        self
    }

    pub fn body(mut self, body: XmlElement) -> Self {
        self.body = Some(body);
        self
    }
}

/// Result of a ctag probe.
#[derive(Debug, Clone)]
pub struct CollectionDirtyState {
    pub is_dirty: bool,
    pub new_ctag: Option<String>,
}
