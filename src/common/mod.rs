pub mod auth;
pub mod http;
pub mod url;

pub use auth::{AuthProvider, Credentials, OAuthConfig, OAuthTokens};
pub use http::{
    ContentEncoding, HttpRequest, HttpResponse, HttpTransport, HyperClient, HyperTransport,
    add_accept_encoding, build_hyper_client, decompress_body, detect_encodings,
};
pub use url::{href_path, resolve_href, url_contains, url_equals};
