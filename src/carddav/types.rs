pub use crate::webdav::types::{DavCollection, DavObject, Depth};

use crate::webdav::types::DavAccount;

/// A CardDAV address-book collection. Unlike calendars, address books carry
/// no extra typed properties beyond the common collection fields.
pub type AddressBook = DavCollection;

/// An object fetched from an address book; `data` is vCard text.
pub type VCard = DavObject;

/// A bootstrapped CardDAV account with its cached address-book list.
#[derive(Debug, Clone)]
pub struct CardDavAccount {
    pub account: DavAccount,
    pub address_books: Vec<AddressBook>,
}

/// Options for [`fetch_vcards`](crate::carddav::CardDavClient::fetch_vcards).
#[derive(Default)]
pub struct FetchVCardsOptions {
    /// Skip the `addressbook-query` and multiget exactly these URLs.
    pub object_urls: Option<Vec<String>>,
    /// Keep only matching hrefs; defaults to `contains(".vcf")`.
    pub url_filter: Option<Box<dyn Fn(&str) -> bool + Send + Sync>>,
}

impl std::fmt::Debug for FetchVCardsOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchVCardsOptions")
            .field("object_urls", &self.object_urls)
            .field("url_filter", &self.url_filter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
