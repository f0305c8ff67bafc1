mod common;

use common::MockTransport;
use dav_sync_rs::carddav::{CardDavClient, FetchVCardsOptions};
use dav_sync_rs::{AccountType, DavAccount};

fn account() -> DavAccount {
    DavAccount {
        account_type: AccountType::CardDav,
        server_url: "https://contacts.ex.com".into(),
        root_url: "https://contacts.ex.com/".into(),
        principal_url: "https://contacts.ex.com/principals/u1/".into(),
        home_url: "https://contacts.ex.com/card/u1/".into(),
    }
}

const HOME_MULTISTATUS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:card="urn:ietf:params:xml:ns:carddav" xmlns:cs="http://calendarserver.org/ns/">
  <d:response>
    <d:href>/card/u1/</d:href>
    <d:propstat>
      <d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/card/u1/contacts/</d:href>
    <d:propstat>
      <d:prop>
        <d:displayname>Contacts</d:displayname>
        <d:resourcetype><d:collection/><card:addressbook/></d:resourcetype>
        <cs:getctag>ctag-c1</cs:getctag>
        <d:sync-token>sync-c1</d:sync-token>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

const REPORT_SET_MULTISTATUS: &str = r#"<d:multistatus xmlns:d="DAV:" xmlns:card="urn:ietf:params:xml:ns:carddav">
  <d:response>
    <d:href>/card/u1/contacts/</d:href>
    <d:propstat>
      <d:prop>
        <d:supported-report-set>
          <d:supported-report><d:report><card:addressbook-multiget/></d:report></d:supported-report>
        </d:supported-report-set>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

const QUERY_MULTISTATUS: &str = r#"<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/card/u1/contacts/jdoe.vcf</d:href>
    <d:propstat>
      <d:prop><d:getetag>"v1"</d:getetag></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

const MULTIGET_MULTISTATUS: &str = r#"<d:multistatus xmlns:d="DAV:" xmlns:card="urn:ietf:params:xml:ns:carddav">
  <d:response>
    <d:href>/card/u1/contacts/jdoe.vcf</d:href>
    <d:propstat>
      <d:prop>
        <d:getetag>"v1"</d:getetag>
        <card:address-data><![CDATA[BEGIN:VCARD
FN:Jane Doe
END:VCARD]]></card:address-data>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

#[tokio::test]
async fn fetch_address_books_keeps_only_addressbook_resources() {
    let transport = MockTransport::new();
    transport.push_multistatus(HOME_MULTISTATUS);
    transport.push_multistatus(REPORT_SET_MULTISTATUS);

    let client = CardDavClient::with_transport(transport.clone(), None);
    let books = client
        .fetch_address_books(&account())
        .await
        .expect("fetches");

    assert_eq!(books.len(), 1);
    assert_eq!(books[0].url, "https://contacts.ex.com/card/u1/contacts/");
    assert_eq!(books[0].display_name.as_deref(), Some("Contacts"));
    assert_eq!(books[0].ctag.as_deref(), Some("ctag-c1"));
    assert_eq!(books[0].sync_token.as_deref(), Some("sync-c1"));
    assert_eq!(books[0].reports, vec!["addressbookMultiget".to_string()]);
}

#[tokio::test]
async fn fetch_vcards_queries_by_fn_then_multigets() {
    let transport = MockTransport::new();
    transport.push_multistatus(HOME_MULTISTATUS);
    transport.push_multistatus(REPORT_SET_MULTISTATUS);
    transport.push_multistatus(QUERY_MULTISTATUS);
    transport.push_multistatus(MULTIGET_MULTISTATUS);

    let client = CardDavClient::with_transport(transport.clone(), None);
    let books = client
        .fetch_address_books(&account())
        .await
        .expect("fetches");

    let vcards = client
        .fetch_vcards(&books[0], FetchVCardsOptions::default())
        .await
        .expect("fetches vcards");

    assert_eq!(vcards.len(), 1);
    assert_eq!(
        vcards[0].url,
        "https://contacts.ex.com/card/u1/contacts/jdoe.vcf"
    );
    assert_eq!(vcards[0].etag.as_deref(), Some("\"v1\""));
    assert!(vcards[0].data.as_deref().is_some_and(|d| d.contains("Jane Doe")));

    let requests = transport.requests();
    assert_eq!(requests.len(), 4);
    let query = String::from_utf8_lossy(requests[2].body.as_ref().expect("body")).into_owned();
    assert!(query.contains("<card:addressbook-query"));
    assert!(query.contains("<card:prop-filter name=\"FN\"/>"));
    let multiget = String::from_utf8_lossy(requests[3].body.as_ref().expect("body")).into_owned();
    assert!(multiget.contains("<card:addressbook-multiget"));
    assert!(multiget.contains("<d:href>/card/u1/contacts/jdoe.vcf</d:href>"));
    assert!(multiget.contains("<card:address-data/>"));
}
