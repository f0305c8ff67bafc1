pub mod client;
pub mod collection;
pub mod discovery;
pub mod object;
pub mod parser;
pub mod sync;
pub mod types;
pub mod xml;

pub use client::WebDavClient;
pub use parser::{DavResponse, Multistatus, PropValue, camel_case, parse_multistatus, parse_xml_tree};
pub use sync::{SyncDiff, SyncMethod, SyncSource, SyncedCollection, smart_collection_sync};
pub use types::{
    AccountType, CollectionDirtyState, CreateAccountOptions, DavAccount, DavCollection, DavObject,
    DavRequest, Depth,
};
pub use xml::{DavNamespace, XmlChild, XmlElement, el, escape_xml, namespace_attrs, render_document};
