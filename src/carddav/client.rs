use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::common::auth::Credentials;
use crate::common::http::{HttpResponse, HttpTransport};
use crate::common::url::{href_path, resolve_href};
use crate::error::{Result, require_fields};
use crate::webdav::client::WebDavClient;
use crate::webdav::parser::map_objects;
use crate::webdav::sync::{SyncDiff, SyncMethod, SyncSource, smart_collection_sync};
use crate::webdav::types::{
    AccountType, CreateAccountOptions, DavAccount, DavCollection, DavObject, Depth,
};
use crate::webdav::xml::{DavNamespace, XmlElement, el};

use crate::carddav::types::{AddressBook, CardDavAccount, FetchVCardsOptions, VCard};

const CARDDAV_NS: &[DavNamespace] = &[DavNamespace::Dav, DavNamespace::CardDav];
const REPORT_SET_CONCURRENCY: usize = 8;

/// CardDAV client: the address-book counterpart of
/// [`CalDavClient`](crate::caldav::CalDavClient).
#[derive(Clone)]
pub struct CardDavClient {
    dav: WebDavClient,
}

impl CardDavClient {
    pub fn new(credentials: Option<Credentials>) -> Result<Self> {
        Ok(Self {
            dav: WebDavClient::new(credentials)?,
        })
    }

    pub fn with_transport(
        transport: Arc<dyn HttpTransport>,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            dav: WebDavClient::with_transport(transport, credentials),
        }
    }

    pub fn with_proxy_url(mut self, proxy_url: impl Into<String>) -> Self {
        self.dav = self.dav.with_proxy_url(proxy_url);
        self
    }

    pub fn webdav(&self) -> &WebDavClient {
        &self.dav
    }

    /// Discover the account and optionally load its address books and their
    /// object snapshots.
    pub async fn create_account(
        &self,
        server_url: &str,
        options: CreateAccountOptions,
    ) -> Result<CardDavAccount> {
        let account = self
            .dav
            .discover_account(AccountType::CardDav, server_url)
            .await?;

        let mut address_books = if options.load_collections || options.load_objects {
            self.fetch_address_books(&account).await?
        } else {
            Vec::new()
        };

        if options.load_objects {
            let snapshots = join_all(address_books.iter().map(|book| {
                self.fetch_vcards_from(&book.url, FetchVCardsOptions::default())
            }))
            .await;
            for (book, objects) in address_books.iter_mut().zip(snapshots) {
                book.objects = objects?;
            }
        }

        Ok(CardDavAccount {
            account,
            address_books,
        })
    }

    /// Enumerate the address books under the account's home set, attaching
    /// each collection's `reports` with bounded fan-out.
    pub async fn fetch_address_books(&self, account: &DavAccount) -> Result<Vec<AddressBook>> {
        require_fields(&[
            ("home_url", !account.home_url.is_empty()),
            ("root_url", !account.root_url.is_empty()),
        ])?;

        let props = vec![
            el("displayname"),
            el("cs:getctag"),
            el("resourcetype"),
            el("sync-token"),
        ];
        let result = self
            .dav
            .propfind(
                &account.home_url,
                props,
                Depth::One,
                &[
                    DavNamespace::Dav,
                    DavNamespace::CardDav,
                    DavNamespace::CalendarServer,
                ],
            )
            .await?;

        let mut address_books = Vec::new();
        for response in &result.responses {
            let Some(href) = response.href.as_deref() else {
                continue;
            };
            let resource_type: Vec<String> = response
                .prop("resourcetype")
                .map(|value| value.keys().iter().map(|key| key.to_string()).collect())
                .unwrap_or_default();
            if !resource_type.iter().any(|tag| tag == "addressbook") {
                continue;
            }

            address_books.push(DavCollection {
                url: resolve_href(&account.root_url, href)?,
                ctag: response.prop_string("getctag"),
                sync_token: response.prop_string("syncToken"),
                display_name: response.prop_string("displayname"),
                resource_type,
                reports: Vec::new(),
                objects: Vec::new(),
            });
        }

        let semaphore = Arc::new(Semaphore::new(REPORT_SET_CONCURRENCY));
        let report_sets = join_all(address_books.iter().map(|book| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                self.dav.supported_report_set(&book.url).await
            }
        }))
        .await;
        for (book, reports) in address_books.iter_mut().zip(report_sets) {
            book.reports = reports?;
        }

        Ok(address_books)
    }

    /// Fetch vCards, either the URLs the caller names or the result of an
    /// `addressbook-query` (default filter `prop-filter name="FN"`), batched
    /// through `addressbook-multiget`.
    pub async fn fetch_vcards(
        &self,
        address_book: &AddressBook,
        options: FetchVCardsOptions,
    ) -> Result<Vec<VCard>> {
        self.fetch_vcards_from(&address_book.url, options).await
    }

    pub(crate) async fn fetch_vcards_from(
        &self,
        collection_url: &str,
        options: FetchVCardsOptions,
    ) -> Result<Vec<DavObject>> {
        let hrefs = match options.object_urls {
            Some(urls) => urls,
            None => {
                let body = el("card:addressbook-query")
                    .child(el("prop").child(el("getetag")))
                    .child(el("card:filter").child(el("card:prop-filter").attr("name", "FN")));
                let result = self
                    .dav
                    .collection_query(
                        collection_url,
                        body,
                        Some(Depth::One),
                        CARDDAV_NS,
                        Some(DavNamespace::Dav),
                    )
                    .await?;
                result
                    .responses
                    .iter()
                    .filter_map(|response| response.href.clone())
                    .collect()
            }
        };

        let mut paths = Vec::with_capacity(hrefs.len());
        for href in &hrefs {
            let href = href.trim();
            if href.is_empty() {
                continue;
            }
            let keep = match &options.url_filter {
                Some(filter) => filter(href),
                None => href.contains(".vcf"),
            };
            if !keep {
                continue;
            }
            paths.push(href_path(&resolve_href(collection_url, href)?));
        }
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        self.addressbook_multiget(collection_url, &paths).await
    }

    /// `addressbook-multiget` REPORT for a batch of object URLs, requesting
    /// `getetag` and `address-data`.
    pub async fn addressbook_multiget(
        &self,
        collection_url: &str,
        hrefs: &[String],
    ) -> Result<Vec<VCard>> {
        if hrefs.is_empty() {
            return Ok(Vec::new());
        }

        let body = el("card:addressbook-multiget")
            .child(el("prop").child(el("getetag")).child(el("card:address-data")))
            .children(hrefs.iter().map(|href| el("href").text(href.as_str())));

        let result = self
            .dav
            .collection_query(
                collection_url,
                body,
                Some(Depth::One),
                CARDDAV_NS,
                Some(DavNamespace::Dav),
            )
            .await?;
        map_objects(collection_url, &result, "addressData")
    }

    /// Create a vCard in the address book; fails if `filename` exists.
    pub async fn create_vcard(
        &self,
        address_book: &AddressBook,
        filename: &str,
        data: impl Into<String>,
    ) -> Result<HttpResponse> {
        let url = resolve_href(&address_book.url, filename)?;
        self.dav
            .create_object(&url, data, "text/vcard; charset=utf-8")
            .await
    }

    /// Replace a vCard, guarded by its etag when present.
    pub async fn update_vcard(&self, vcard: &VCard) -> Result<HttpResponse> {
        self.dav
            .update_object(
                &vcard.url,
                vcard.data.clone().unwrap_or_default(),
                vcard.etag.as_deref(),
                "text/vcard; charset=utf-8",
            )
            .await
    }

    /// Delete a vCard, guarded by its etag when present.
    pub async fn delete_vcard(&self, vcard: &VCard) -> Result<HttpResponse> {
        self.dav.delete_object(&vcard.url, vcard.etag.as_deref()).await
    }

    /// Reconcile one address book with the server; see
    /// [`smart_collection_sync`].
    pub async fn smart_address_book_sync(
        &self,
        address_book: &AddressBook,
        method: Option<SyncMethod>,
    ) -> Result<(AddressBook, SyncDiff)> {
        let outcome = smart_collection_sync(&self.dav, self, address_book, method).await?;
        Ok((outcome.collection, outcome.diff))
    }
}

#[async_trait]
impl SyncSource for CardDavClient {
    fn object_extension(&self) -> &'static str {
        ".vcf"
    }

    fn data_prop(&self) -> XmlElement {
        el("card:address-data")
    }

    fn namespaces(&self) -> &'static [DavNamespace] {
        CARDDAV_NS
    }

    async fn multiget(&self, collection_url: &str, hrefs: &[String]) -> Result<Vec<DavObject>> {
        let mut paths = Vec::with_capacity(hrefs.len());
        for href in hrefs {
            paths.push(href_path(&resolve_href(collection_url, href)?));
        }
        self.addressbook_multiget(collection_url, &paths).await
    }

    async fn fetch_objects(&self, collection: &DavCollection) -> Result<Vec<DavObject>> {
        self.fetch_vcards_from(&collection.url, FetchVCardsOptions::default())
            .await
    }
}
