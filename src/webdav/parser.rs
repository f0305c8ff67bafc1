//! Response-body decoding: XML into a generic property tree, and
//! `207 Multi-Status` bodies into per-resource [`DavResponse`] envelopes.
//!
//! Element local names are lowercased and camelCased (`supported-report-set`
//! becomes `supportedReportSet`), namespace prefixes stripped. Scalar text is
//! coerced: decimal strings become numbers, `true`/`false` become booleans.
//! Attributes land under the reserved `_attributes` key, CDATA under `_cdata`
//! when the element carries other content.

use std::collections::BTreeMap;
use std::io::Cursor;

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use crate::common::http::HttpResponse;
use crate::error::{DavError, Result};

/// Decoded XML value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// Element with no content (`<d:sync-collection/>`).
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<PropValue>),
    Map(BTreeMap<String, PropValue>),
}

impl PropValue {
    pub fn get(&self, key: &str) -> Option<&PropValue> {
        match self {
            PropValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Render a scalar back to its string form. For maps, `_cdata` wins over
    /// `_text` (an element whose payload arrived as CDATA alongside
    /// attributes or children).
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            PropValue::Text(text) => Some(text.clone()),
            PropValue::Int(value) => Some(value.to_string()),
            PropValue::Float(value) => Some(value.to_string()),
            PropValue::Bool(value) => Some(value.to_string()),
            PropValue::Map(_) => self
                .get("_cdata")
                .or_else(|| self.get("_text"))
                .and_then(PropValue::scalar_string),
            _ => None,
        }
    }

    /// Normalize to a list: lists yield their items, `Empty` yields nothing,
    /// any other value yields itself.
    pub fn as_list(&self) -> Vec<&PropValue> {
        match self {
            PropValue::List(items) => items.iter().collect(),
            PropValue::Empty => Vec::new(),
            other => vec![other],
        }
    }

    /// First non-reserved key of a map value.
    pub fn first_key(&self) -> Option<&str> {
        match self {
            PropValue::Map(map) => map
                .keys()
                .find(|key| !key.starts_with('_'))
                .map(String::as_str),
            _ => None,
        }
    }

    /// All non-reserved keys of a map value.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            PropValue::Map(map) => map
                .keys()
                .filter(|key| !key.starts_with('_'))
                .map(String::as_str)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_empty_value(&self) -> bool {
        match self {
            PropValue::Empty => true,
            PropValue::Text(text) => text.is_empty(),
            _ => false,
        }
    }
}

/// Normalized multistatus document.
#[derive(Debug, Clone)]
pub struct Multistatus {
    pub responses: Vec<DavResponse>,
    /// Top-level `sync-token` of a `sync-collection` REPORT (RFC 6578).
    pub sync_token: Option<String>,
}

impl Multistatus {
    /// The degenerate envelope for a non-XML or non-2xx exchange: one
    /// synthetic response carrying the transport status and the raw body.
    pub fn synthetic(response: &HttpResponse) -> Self {
        let status = response.status.as_u16();
        let body = response.body_text();
        Self {
            responses: vec![DavResponse {
                href: Some(response.url.clone()),
                status,
                status_text: response.status_text().to_string(),
                ok: (200..400).contains(&status),
                error: None,
                response_description: None,
                props: BTreeMap::new(),
                raw: if body.is_empty() {
                    PropValue::Empty
                } else {
                    PropValue::Text(body)
                },
            }],
            sync_token: None,
        }
    }
}

/// Per-resource slice of a multistatus response.
#[derive(Debug, Clone)]
pub struct DavResponse {
    pub href: Option<String>,
    pub status: u16,
    pub status_text: String,
    /// True iff the response carried no `error` element.
    pub ok: bool,
    /// Condition name of the `error` element, when present.
    pub error: Option<String>,
    pub response_description: Option<String>,
    /// Flattened props: every `propstat`'s `prop` children shallow-merged,
    /// later entries winning on key collision.
    pub props: BTreeMap<String, PropValue>,
    /// The undigested response subtree, for callers that need per-propstat
    /// statuses or other structure the flatten loses.
    pub raw: PropValue,
}

impl DavResponse {
    pub fn prop(&self, key: &str) -> Option<&PropValue> {
        self.props.get(key)
    }

    pub fn prop_string(&self, key: &str) -> Option<String> {
        self.props.get(key).and_then(PropValue::scalar_string)
    }
}

/// Lowercase a local element name and fold `-`/`_` into camelCase.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '-' || ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

fn local_name(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|b| *b == b':') {
        Some(idx) => &raw[idx + 1..],
        None => raw,
    }
}

fn coerce_scalar(text: &str) -> PropValue {
    if text.eq_ignore_ascii_case("true") {
        return PropValue::Bool(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return PropValue::Bool(false);
    }
    let numeric_lead = text
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '+' || c == '.');
    if numeric_lead && !text.contains(['\n', ' ']) {
        if let Ok(value) = text.parse::<i64>() {
            return PropValue::Int(value);
        }
        if let Ok(value) = text.parse::<f64>()
            && value.is_finite()
        {
            return PropValue::Float(value);
        }
    }
    PropValue::Text(text.to_string())
}

struct Frame {
    key: String,
    attributes: Vec<(String, String)>,
    text: String,
    cdata: Option<String>,
    children: Vec<(String, PropValue)>,
}

impl Frame {
    fn open(event: &BytesStart<'_>) -> Result<Self> {
        let key = camel_case(&String::from_utf8_lossy(local_name(
            event.name().as_ref(),
        )));
        let mut attributes = Vec::new();
        for attr in event.attributes().with_checks(false) {
            let attr = attr.map_err(|err| DavError::Xml(format!("invalid attribute: {err}")))?;
            let name = String::from_utf8_lossy(local_name(attr.key.as_ref())).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| DavError::Xml(format!("invalid attribute value: {err}")))?
                .into_owned();
            // Namespace declarations are prefix bookkeeping, not data.
            if attr.key.as_ref().starts_with(b"xmlns") {
                continue;
            }
            attributes.push((name, value));
        }
        Ok(Self {
            key,
            attributes,
            text: String::new(),
            cdata: None,
            children: Vec::new(),
        })
    }

    fn finalize(self) -> (String, PropValue) {
        let trimmed = self.text.trim();
        if self.children.is_empty() && self.attributes.is_empty() {
            let value = if let Some(cdata) = self.cdata {
                PropValue::Text(cdata)
            } else if trimmed.is_empty() {
                PropValue::Empty
            } else {
                coerce_scalar(trimmed)
            };
            return (self.key, value);
        }

        let mut map = BTreeMap::new();
        for (key, value) in self.children {
            insert_folding(&mut map, key, value);
        }
        if !self.attributes.is_empty() {
            let attrs = self
                .attributes
                .into_iter()
                .map(|(name, value)| (name, PropValue::Text(value)))
                .collect();
            map.insert("_attributes".to_string(), PropValue::Map(attrs));
        }
        if let Some(cdata) = self.cdata {
            map.insert("_cdata".to_string(), PropValue::Text(cdata));
        }
        if !trimmed.is_empty() {
            map.insert("_text".to_string(), coerce_scalar(trimmed));
        }
        (self.key, PropValue::Map(map))
    }
}

/// Repeated sibling elements fold into a list under their shared key.
fn insert_folding(map: &mut BTreeMap<String, PropValue>, key: String, value: PropValue) {
    match map.entry(key) {
        std::collections::btree_map::Entry::Vacant(entry) => {
            entry.insert(value);
        }
        std::collections::btree_map::Entry::Occupied(mut entry) => {
            let slot = entry.get_mut();
            if let PropValue::List(items) = slot {
                items.push(value);
            } else {
                let prev = std::mem::replace(slot, PropValue::Empty);
                *slot = PropValue::List(vec![prev, value]);
            }
        }
    }
}

fn decode_text(raw: &[u8]) -> Result<String> {
    match std::str::from_utf8(raw) {
        Ok(text) => Ok(unescape(text)
            .map_err(|err| DavError::Xml(format!("xml decode error: {err}")))?
            .into_owned()),
        Err(_) => Ok(String::from_utf8_lossy(raw).into_owned()),
    }
}

/// Parse an XML body into the generic property tree. The result is a map
/// keyed by the (camelCased) root element name.
pub fn parse_xml_tree(body: &[u8]) -> Result<PropValue> {
    let mut xml = Reader::from_reader(Cursor::new(body));
    xml.config_mut().trim_text(false);

    let mut buf = Vec::with_capacity(8 * 1024);
    let mut stack: Vec<Frame> = Vec::with_capacity(16);
    let mut root: BTreeMap<String, PropValue> = BTreeMap::new();
    let mut saw_element = false;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                saw_element = true;
                stack.push(Frame::open(&e)?);
            }
            Ok(Event::Empty(e)) => {
                saw_element = true;
                let (key, value) = Frame::open(&e)?.finalize();
                match stack.last_mut() {
                    Some(parent) => parent.children.push((key, value)),
                    None => insert_folding(&mut root, key, value),
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&decode_text(e.as_ref())?);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(frame) = stack.last_mut() {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    frame.cdata.get_or_insert_default().push_str(&text);
                }
            }
            Ok(Event::End(_)) => {
                if let Some(frame) = stack.pop() {
                    let (key, value) = frame.finalize();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push((key, value)),
                        None => insert_folding(&mut root, key, value),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(DavError::Xml(format!("xml parsing error: {err}"))),
            _ => {}
        }
        buf.clear();
    }

    if !saw_element {
        return Err(DavError::Xml("body contains no xml elements".into()));
    }
    Ok(PropValue::Map(root))
}

/// Split a `HTTP/1.1 404 Not Found` status line into code and reason.
fn parse_status_line(line: &str) -> Option<(u16, String)> {
    let mut parts = line.trim().splitn(3, char::is_whitespace);
    let _protocol = parts.next()?;
    let status = parts.next()?.parse::<u16>().ok()?;
    let text = parts.next()?.trim();
    if text.is_empty() {
        return None;
    }
    Some((status, text.to_string()))
}

fn describe_error(value: &PropValue) -> String {
    match value {
        PropValue::Map(_) => value.first_key().unwrap_or("error").to_string(),
        other => other.scalar_string().unwrap_or_else(|| "error".to_string()),
    }
}

fn normalize_response(raw: &PropValue, fallback: (u16, &str)) -> DavResponse {
    let href = raw.get("href").and_then(PropValue::scalar_string);
    let (status, status_text) = raw
        .get("status")
        .and_then(PropValue::scalar_string)
        .as_deref()
        .and_then(parse_status_line)
        .unwrap_or_else(|| (fallback.0, fallback.1.to_string()));

    let mut props = BTreeMap::new();
    for propstat in raw
        .get("propstat")
        .map(PropValue::as_list)
        .unwrap_or_default()
    {
        if let Some(PropValue::Map(prop)) = propstat.get("prop") {
            for (key, value) in prop {
                props.insert(key.clone(), value.clone());
            }
        }
    }

    let error = raw.get("error").map(describe_error);
    let response_description = raw
        .get("responsedescription")
        .and_then(PropValue::scalar_string);

    DavResponse {
        href,
        status,
        status_text,
        ok: error.is_none(),
        error,
        response_description,
        props,
        raw: raw.clone(),
    }
}

/// Map multiget/query responses to objects: href resolved against the
/// collection URL, etag from `getetag`, payload from `data_key`
/// (CDATA or plain text).
pub(crate) fn map_objects(
    base_url: &str,
    result: &Multistatus,
    data_key: &str,
) -> Result<Vec<crate::webdav::types::DavObject>> {
    let mut objects = Vec::with_capacity(result.responses.len());
    for response in &result.responses {
        let Some(href) = response.href.as_deref() else {
            continue;
        };
        objects.push(crate::webdav::types::DavObject {
            url: crate::common::url::resolve_href(base_url, href)?,
            etag: response.prop_string("getetag"),
            data: response.prop_string(data_key),
        });
    }
    Ok(objects)
}

/// Decode a `207 Multi-Status` body. `fallback` supplies the transport-level
/// status used when a response has no parseable `status` line.
pub fn parse_multistatus(body: &[u8], fallback: (u16, &str)) -> Result<Multistatus> {
    let tree = parse_xml_tree(body)?;
    let multistatus = tree
        .get("multistatus")
        .ok_or_else(|| DavError::Xml("missing multistatus root".into()))?;

    let sync_token = multistatus
        .get("syncToken")
        .and_then(PropValue::scalar_string);
    let responses = multistatus
        .get("response")
        .map(PropValue::as_list)
        .unwrap_or_default()
        .into_iter()
        .map(|raw| normalize_response(raw, fallback))
        .collect();

    Ok(Multistatus {
        responses,
        sync_token,
    })
}
