use dav_sync_rs::webdav::{PropValue, camel_case, parse_multistatus, parse_xml_tree};

#[test]
fn parse_multistatus_extracts_calendar_properties() {
    let xml = r#"
<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:response>
    <D:href>/dav/user01/personal/</D:href>
    <D:propstat>
      <D:prop>
        <D:displayname>Personal</D:displayname>
        <D:getetag>"etag-123"</D:getetag>
        <D:resourcetype>
          <D:collection/>
          <C:calendar/>
        </D:resourcetype>
        <C:supported-calendar-component-set>
          <C:comp name="VEVENT"/>
          <C:comp name="VTODO"/>
        </C:supported-calendar-component-set>
        <C:calendar-data><![CDATA[BEGIN:VCALENDAR
END:VCALENDAR
]]></C:calendar-data>
        <D:sync-token>token-abc</D:sync-token>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>
"#;

    let result = parse_multistatus(xml.as_bytes(), (207, "Multi-Status")).expect("parses");
    assert_eq!(result.responses.len(), 1);

    let response = &result.responses[0];
    assert_eq!(response.href.as_deref(), Some("/dav/user01/personal/"));
    assert!(response.ok);
    assert_eq!(response.prop_string("displayname").as_deref(), Some("Personal"));
    assert_eq!(
        response.prop_string("getetag").as_deref(),
        Some("\"etag-123\"")
    );
    assert_eq!(response.prop_string("syncToken").as_deref(), Some("token-abc"));

    // resourcetype keys survive with prefixes stripped
    let resourcetype = response.prop("resourcetype").expect("resourcetype");
    assert_eq!(resourcetype.keys(), vec!["calendar", "collection"]);

    // comp names live under _attributes
    let comps: Vec<&str> = response
        .prop("supportedCalendarComponentSet")
        .and_then(|set| set.get("comp"))
        .map(PropValue::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(|comp| {
            comp.get("_attributes")
                .and_then(|attrs| attrs.get("name"))
                .and_then(PropValue::as_text)
        })
        .collect();
    assert_eq!(comps, vec!["VEVENT", "VTODO"]);

    // CDATA payload survives verbatim
    let data = response.prop_string("calendarData").expect("calendar data");
    assert!(data.contains("BEGIN:VCALENDAR"));
}

#[test]
fn status_line_wins_over_transport_fallback() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/c/gone.ics</d:href>
    <d:status>HTTP/1.1 404 Not Found</d:status>
  </d:response>
  <d:response>
    <d:href>/c/kept.ics</d:href>
    <d:propstat>
      <d:prop><d:getetag>"e1"</d:getetag></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

    let result = parse_multistatus(xml.as_bytes(), (207, "Multi-Status")).expect("parses");
    assert_eq!(result.responses[0].status, 404);
    assert_eq!(result.responses[0].status_text, "Not Found");
    // no response-level status line: transport status applies
    assert_eq!(result.responses[1].status, 207);
    assert_eq!(result.responses[1].status_text, "Multi-Status");
}

#[test]
fn later_propstat_wins_on_key_collision() {
    let xml = r#"<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/c/</d:href>
    <d:propstat>
      <d:prop><d:displayname>old</d:displayname></d:prop>
      <d:status>HTTP/1.1 404 Not Found</d:status>
    </d:propstat>
    <d:propstat>
      <d:prop><d:displayname>new</d:displayname><d:getetag>"e"</d:getetag></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

    let result = parse_multistatus(xml.as_bytes(), (207, "Multi-Status")).expect("parses");
    let response = &result.responses[0];
    assert_eq!(response.prop_string("displayname").as_deref(), Some("new"));
    assert_eq!(response.prop_string("getetag").as_deref(), Some("\"e\""));
    // the flatten is lossy on purpose; the subtree keeps both propstats
    assert_eq!(
        response
            .raw
            .get("propstat")
            .map(|propstat| propstat.as_list().len()),
        Some(2)
    );
}

#[test]
fn error_element_clears_ok() {
    let xml = r#"<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/c/bad.ics</d:href>
    <d:error><d:valid-resourcetype/></d:error>
    <d:responsedescription>resource type not supported</d:responsedescription>
  </d:response>
  <d:response>
    <d:href>/c/good.ics</d:href>
  </d:response>
</d:multistatus>"#;

    let result = parse_multistatus(xml.as_bytes(), (207, "Multi-Status")).expect("parses");
    let bad = &result.responses[0];
    assert!(!bad.ok);
    assert_eq!(bad.error.as_deref(), Some("validResourcetype"));
    assert_eq!(
        bad.response_description.as_deref(),
        Some("resource type not supported")
    );
    assert!(result.responses[1].ok);
}

#[test]
fn top_level_sync_token_is_surfaced() {
    let xml = r#"<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/c/1.ics</d:href>
    <d:propstat>
      <d:prop><d:getetag>"e1"</d:getetag></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:sync-token>http://ex.com/sync/42</d:sync-token>
</d:multistatus>"#;

    let result = parse_multistatus(xml.as_bytes(), (207, "Multi-Status")).expect("parses");
    assert_eq!(result.sync_token.as_deref(), Some("http://ex.com/sync/42"));
}

#[test]
fn scalars_are_coerced() {
    let xml = r#"<root>
  <count>42</count>
  <ratio>0.5</ratio>
  <flag>TRUE</flag>
  <other>false</other>
  <name>plain</name>
  <nothing/>
</root>"#;

    let tree = parse_xml_tree(xml.as_bytes()).expect("parses");
    let root = tree.get("root").expect("root");
    assert_eq!(root.get("count"), Some(&PropValue::Int(42)));
    assert_eq!(root.get("ratio"), Some(&PropValue::Float(0.5)));
    assert_eq!(root.get("flag"), Some(&PropValue::Bool(true)));
    assert_eq!(root.get("other"), Some(&PropValue::Bool(false)));
    assert_eq!(root.get("name"), Some(&PropValue::Text("plain".into())));
    assert_eq!(root.get("nothing"), Some(&PropValue::Empty));
}

#[test]
fn camel_case_folds_hyphens_and_underscores() {
    assert_eq!(camel_case("supported-report-set"), "supportedReportSet");
    assert_eq!(camel_case("sync-token"), "syncToken");
    assert_eq!(camel_case("current_user_principal"), "currentUserPrincipal");
    assert_eq!(camel_case("DISPLAYNAME"), "displayname");
    assert_eq!(camel_case("href"), "href");
}

#[test]
fn repeated_siblings_fold_into_a_list() {
    let xml = r#"<d:multistatus xmlns:d="DAV:">
  <d:response><d:href>/a/</d:href></d:response>
  <d:response><d:href>/b/</d:href></d:response>
  <d:response><d:href>/c/</d:href></d:response>
</d:multistatus>"#;

    let result = parse_multistatus(xml.as_bytes(), (207, "Multi-Status")).expect("parses");
    let hrefs: Vec<Option<&str>> = result
        .responses
        .iter()
        .map(|response| response.href.as_deref())
        .collect();
    assert_eq!(hrefs, vec![Some("/a/"), Some("/b/"), Some("/c/")]);
}

#[test]
fn single_response_normalizes_to_one_element_array() {
    let xml = r#"<d:multistatus xmlns:d="DAV:">
  <d:response><d:href>/only/</d:href></d:response>
</d:multistatus>"#;

    let result = parse_multistatus(xml.as_bytes(), (207, "Multi-Status")).expect("parses");
    assert_eq!(result.responses.len(), 1);
}

#[test]
fn non_xml_body_is_an_error() {
    assert!(parse_multistatus(b"not xml at all", (200, "OK")).is_err());
    assert!(parse_multistatus(b"", (200, "OK")).is_err());
}

#[test]
fn encode_decode_roundtrip_preserves_camelcased_keys() {
    use dav_sync_rs::webdav::{DavNamespace, el, render_document};

    let body = el("propfind")
        .namespaces(&[DavNamespace::Dav, DavNamespace::CalDav])
        .child(
            el("prop")
                .child(el("displayname"))
                .child(el("sync-token"))
                .child(el("c:supported-calendar-component-set")),
        );
    let xml = render_document(&body, Some(DavNamespace::Dav));

    let tree = parse_xml_tree(xml.as_bytes()).expect("parses");
    let prop = tree
        .get("propfind")
        .and_then(|pf| pf.get("prop"))
        .expect("prop");
    assert_eq!(
        prop.keys(),
        vec!["displayname", "supportedCalendarComponentSet", "syncToken"]
    );
}
