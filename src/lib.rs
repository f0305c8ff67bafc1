//! CalDAV/CardDAV client library with incremental collection sync.
//!
//! This library provides an asynchronous CalDAV (RFC 4791) and CardDAV
//! (RFC 6352) client built on modern Rust ecosystem components including
//! hyper 1.x, rustls, and tokio. It covers the full client lifecycle:
//!
//! - Account bootstrap: `.well-known` probing, principal lookup, home-set
//!   lookup
//! - Collection enumeration with typed calendar/address-book mapping
//! - Object fetch via `calendar-query`/`addressbook-query` plus batched
//!   multiget, and conditional writes guarded by etags
//! - Incremental reconciliation against a local snapshot, preferring WebDAV
//!   `sync-collection` tokens (RFC 6578) and falling back to ctag comparison
//!
//! iCalendar and vCard payloads are carried as opaque strings; parsing them
//! is the caller's concern.
//!
//! # Account bootstrap and first sync
//!
//! ```no_run
//! use dav_sync_rs::caldav::{CalDavClient, CreateAccountOptions};
//! use dav_sync_rs::common::Credentials;
//!
//! #[tokio::main]
//! async fn main() -> dav_sync_rs::error::Result<()> {
//!     let client = CalDavClient::new(Some(Credentials::basic("user01", "secret")))?;
//!
//!     // Discover the account and load its calendar list.
//!     let account = client
//!         .create_account(
//!             "https://cal.example.com",
//!             CreateAccountOptions { load_collections: true, load_objects: true },
//!         )
//!         .await?;
//!
//!     // Later: reconcile every calendar whose change witness moved.
//!     let synced = client
//!         .sync_calendars(&account.account, &account.calendars)
//!         .await?;
//!     for calendar in &synced.updated {
//!         println!(
//!             "{} now holds {} objects",
//!             calendar.collection.url,
//!             calendar.collection.objects.len()
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Raw WebDAV access
//!
//! The typed adapters sit on [`webdav::WebDavClient`], which exposes the
//! request/response codec directly for anything the adapters don't cover:
//!
//! ```no_run
//! use dav_sync_rs::webdav::{DavNamespace, Depth, WebDavClient, el};
//!
//! # async fn example(client: &WebDavClient) -> dav_sync_rs::error::Result<()> {
//! let result = client
//!     .propfind(
//!         "https://cal.example.com/dav/user01/",
//!         vec![el("displayname"), el("cs:getctag")],
//!         Depth::One,
//!         &[DavNamespace::Dav, DavNamespace::CalendarServer],
//!     )
//!     .await?;
//! for response in &result.responses {
//!     println!("{:?} {:?}", response.href, response.prop_string("displayname"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod caldav;
pub mod carddav;
pub mod common;
pub mod error;
pub mod webdav;

pub use caldav::{
    CalDavAccount, CalDavClient, Calendar, CalendarComponent, CalendarObject, CalendarSyncResult,
    FetchObjectsOptions, TimeRange,
};
pub use carddav::{AddressBook, CardDavAccount, CardDavClient, FetchVCardsOptions, VCard};
pub use common::auth::{AuthProvider, Credentials, OAuthConfig, OAuthTokens};
pub use common::http::{HttpRequest, HttpResponse, HttpTransport, HyperTransport};
pub use common::url::{href_path, resolve_href, url_contains, url_equals};
pub use error::DavError;
pub use webdav::{
    AccountType, CreateAccountOptions, DavAccount, DavCollection, DavNamespace, DavObject,
    DavRequest, DavResponse, Depth, Multistatus, PropValue, SyncDiff, SyncMethod, SyncSource,
    SyncedCollection, WebDavClient, XmlElement, el, smart_collection_sync,
};
