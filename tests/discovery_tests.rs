mod common;

use common::{MockTransport, redirect};
use dav_sync_rs::{AccountType, DavError, WebDavClient};

const PRINCIPAL_MULTISTATUS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/dav/</d:href>
    <d:propstat>
      <d:prop>
        <d:current-user-principal><d:href>/principals/u1/</d:href></d:current-user-principal>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

const HOME_MULTISTATUS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/principals/u1/</d:href>
    <d:propstat>
      <d:prop>
        <c:calendar-home-set><d:href>/cal/u1/</d:href></c:calendar-home-set>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

#[tokio::test]
async fn discovery_follows_well_known_redirect() {
    let transport = MockTransport::new();
    transport.push(redirect(301, "/dav/"));
    transport.push_multistatus(PRINCIPAL_MULTISTATUS);
    transport.push_multistatus(HOME_MULTISTATUS);

    let client = WebDavClient::with_transport(transport.clone(), None);
    let account = client
        .discover_account(AccountType::CalDav, "https://ex.com")
        .await
        .expect("discovers");

    assert_eq!(account.root_url, "https://ex.com/dav/");
    assert_eq!(account.principal_url, "https://ex.com/principals/u1/");
    assert_eq!(account.home_url, "https://ex.com/cal/u1/");

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].url, "https://ex.com/.well-known/caldav");
    assert_eq!(requests[0].method.as_str(), "PROPFIND");
    // the probe must not auto-follow the redirect
    assert!(!requests[0].follow_redirects);
    assert_eq!(requests[1].url, "https://ex.com/dav/");
    assert_eq!(requests[2].url, "https://ex.com/principals/u1/");
}

#[tokio::test]
async fn redirect_keeps_original_port_and_scheme() {
    let transport = MockTransport::new();
    // same host, port omitted, scheme downgraded
    transport.push(redirect(302, "http://ex.com/dav/"));

    let client = WebDavClient::with_transport(transport.clone(), None);
    let root = client
        .service_discovery(AccountType::CalDav, "https://ex.com:8443")
        .await
        .expect("discovers");

    assert_eq!(root, "https://ex.com:8443/dav/");
}

#[tokio::test]
async fn unredirected_well_known_degrades_to_server_url() {
    let transport = MockTransport::new();
    transport.push_status(404, "");

    let client = WebDavClient::with_transport(transport.clone(), None);
    let root = client
        .service_discovery(AccountType::CardDav, "https://ex.com")
        .await
        .expect("discovers");

    assert_eq!(root, "https://ex.com/");
    assert_eq!(
        transport.requests()[0].url,
        "https://ex.com/.well-known/carddav"
    );
}

#[tokio::test]
async fn transport_failure_during_probe_is_swallowed() {
    // an empty script makes the transport fail the probe outright
    let transport = MockTransport::new();

    let client = WebDavClient::with_transport(transport.clone(), None);
    let root = client
        .service_discovery(AccountType::CalDav, "https://ex.com")
        .await
        .expect("degrades");

    assert_eq!(root, "https://ex.com/");
}

#[tokio::test]
async fn unauthorized_principal_lookup_is_invalid_credentials() {
    let transport = MockTransport::new();
    transport.push_status(401, "unauthorized");

    let client = WebDavClient::with_transport(transport.clone(), None);
    let err = client
        .fetch_principal_url("https://ex.com/dav/")
        .await
        .expect_err("401 must fail");
    assert!(matches!(err, DavError::InvalidCredentials));
}

#[tokio::test]
async fn missing_home_set_is_home_url_not_found() {
    let transport = MockTransport::new();
    // response href does not match the principal url
    transport.push_multistatus(
        r#"<d:multistatus xmlns:d="DAV:">
  <d:response><d:href>/other/</d:href></d:response>
</d:multistatus>"#,
    );

    let client = WebDavClient::with_transport(transport.clone(), None);
    let err = client
        .fetch_home_url(
            AccountType::CalDav,
            "https://ex.com/principals/u1/",
            "https://ex.com/",
        )
        .await
        .expect_err("no matching response");
    assert!(matches!(err, DavError::HomeUrlNotFound { .. }));
}
