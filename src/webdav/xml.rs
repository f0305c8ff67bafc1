//! Request-body encoding: a namespaced element tree with a small builder DSL.
//!
//! DAV request bodies are shallow but heavily namespaced. Instead of nesting
//! string literals, callers build an [`XmlElement`] tree with [`el`] and
//! render it with [`render_document`]. Element names carrying a prefix
//! (`c:calendar-data`) are emitted verbatim; bare names pick up the
//! document's default namespace prefix (`prop` becomes `d:prop`).

/// The XML namespaces used across CalDAV/CardDAV requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DavNamespace {
    /// `DAV:` (prefix `d`)
    Dav,
    /// `urn:ietf:params:xml:ns:caldav` (prefix `c`)
    CalDav,
    /// `urn:ietf:params:xml:ns:carddav` (prefix `card`)
    CardDav,
    /// `http://calendarserver.org/ns/` (prefix `cs`)
    CalendarServer,
    /// `http://apple.com/ns/ical/` (prefix `ca`)
    AppleIcal,
}

impl DavNamespace {
    pub fn prefix(self) -> &'static str {
        match self {
            DavNamespace::Dav => "d",
            DavNamespace::CalDav => "c",
            DavNamespace::CardDav => "card",
            DavNamespace::CalendarServer => "cs",
            DavNamespace::AppleIcal => "ca",
        }
    }

    pub fn uri(self) -> &'static str {
        match self {
            DavNamespace::Dav => "DAV:",
            DavNamespace::CalDav => "urn:ietf:params:xml:ns:caldav",
            DavNamespace::CardDav => "urn:ietf:params:xml:ns:carddav",
            DavNamespace::CalendarServer => "http://calendarserver.org/ns/",
            DavNamespace::AppleIcal => "http://apple.com/ns/ical/",
        }
    }
}

/// `xmlns:<prefix>="<uri>"` attribute pairs for a namespace set, attached to
/// the root element of a request body.
pub fn namespace_attrs(namespaces: &[DavNamespace]) -> Vec<(String, String)> {
    namespaces
        .iter()
        .map(|ns| (format!("xmlns:{}", ns.prefix()), ns.uri().to_string()))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlChild {
    Element(XmlElement),
    Text(String),
    Cdata(String),
}

/// One element of a request body: name, attributes, ordered children.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlChild>,
}

/// Start a new element. Prefix the name explicitly (`"c:comp-filter"`) to
/// pin a namespace; leave it bare to inherit the document default.
pub fn el(name: impl Into<String>) -> XmlElement {
    XmlElement {
        name: name.into(),
        attributes: Vec::new(),
        children: Vec::new(),
    }
}

impl XmlElement {
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn attrs(mut self, attrs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.attributes.extend(attrs);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlChild::Text(text.into()));
        self
    }

    pub fn cdata(mut self, data: impl Into<String>) -> Self {
        self.children.push(XmlChild::Cdata(data.into()));
        self
    }

    pub fn child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlChild::Element(child));
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = XmlElement>) -> Self {
        self.children
            .extend(children.into_iter().map(XmlChild::Element));
        self
    }

    /// Attach the `xmlns` declarations for `namespaces` to this element.
    pub fn namespaces(self, namespaces: &[DavNamespace]) -> Self {
        self.attrs(namespace_attrs(namespaces))
    }

    fn qualified_name(&self, default_ns: Option<DavNamespace>) -> String {
        match default_ns {
            Some(ns) if !self.name.contains(':') => format!("{}:{}", ns.prefix(), self.name),
            _ => self.name.clone(),
        }
    }

    fn write_into(&self, out: &mut String, default_ns: Option<DavNamespace>) {
        let name = self.qualified_name(default_ns);
        out.push('<');
        out.push_str(&name);
        for (attr, value) in &self.attributes {
            out.push(' ');
            out.push_str(attr);
            out.push_str("=\"");
            out.push_str(&escape_xml(value));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlChild::Element(element) => element.write_into(out, default_ns),
                XmlChild::Text(text) => out.push_str(&escape_xml(text)),
                XmlChild::Cdata(data) => {
                    out.push_str("<![CDATA[");
                    out.push_str(data);
                    out.push_str("]]>");
                }
            }
        }
        out.push_str("</");
        out.push_str(&name);
        out.push('>');
    }
}

/// Render a complete request document, declaration included.
pub fn render_document(root: &XmlElement, default_ns: Option<DavNamespace>) -> String {
    let mut out = String::with_capacity(256);
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>");
    root.write_into(&mut out, default_ns);
    out
}

pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
