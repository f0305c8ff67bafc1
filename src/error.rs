use thiserror::Error;

/// Errors surfaced by the client.
///
/// HTTP 4xx/5xx responses to DAV requests are generally *not* errors: they
/// come back as non-`ok` [`DavResponse`](crate::webdav::types::DavResponse)
/// envelopes and the caller decides whether that is fatal. The variants here
/// cover the cases where no usable envelope can be produced, plus the
/// protocol-level failures a caller is expected to match on.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DavError {
    /// The server rejected the supplied credentials (HTTP 401 during
    /// principal discovery).
    #[error("server rejected the supplied credentials")]
    InvalidCredentials,

    /// No response of the home-set PROPFIND matched the principal URL.
    #[error("no calendar/addressbook home found for principal {principal}")]
    HomeUrlNotFound { principal: String },

    /// No response of a collection-level PROPFIND matched the collection URL.
    #[error("no response matched collection {url}")]
    CollectionNotFound { url: String },

    /// An operation was invoked without the account or collection fields it
    /// needs.
    #[error("missing required fields: {fields:?}")]
    MissingFields { fields: Vec<&'static str> },

    /// A time-range endpoint was not ISO-8601.
    #[error("not an ISO-8601 time range: {value:?}")]
    InvalidTimeRange { value: String },

    /// The OAuth configuration lacks fields required for the attempted grant.
    #[error("incomplete oauth configuration, missing: {fields:?}")]
    OAuthConfigMissing { fields: Vec<&'static str> },

    /// The OAuth token endpoint answered with a non-2xx status.
    #[error("oauth token endpoint returned {status}")]
    OAuthFetchFailed { status: u16 },

    /// The HTTP collaborator failed before a response could be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// A request or response body could not be encoded/decoded as XML.
    #[error("xml error: {0}")]
    Xml(String),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl DavError {
    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Collect the names of absent fields; `Ok` when the set is complete.
pub(crate) fn missing_fields(
    checks: &[(&'static str, bool)],
) -> std::result::Result<(), Vec<&'static str>> {
    let missing: Vec<&'static str> = checks
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() { Ok(()) } else { Err(missing) }
}

pub(crate) fn require_fields(checks: &[(&'static str, bool)]) -> Result<()> {
    missing_fields(checks).map_err(|fields| DavError::MissingFields { fields })
}

impl From<quick_xml::Error> for DavError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Xml(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DavError>;
