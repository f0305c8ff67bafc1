//! Incremental collection reconciliation.
//!
//! [`smart_collection_sync`] picks between the WebDAV `sync-collection`
//! strategy (when the collection advertises the `syncCollection` report) and
//! the ctag strategy, diffs the server state against the local snapshot, and
//! emits a *new* collection value; the input is never mutated.
//!
//! The protocol-specific half (which href extension marks an object, which
//! property carries its payload, how to multiget) is injected through the
//! [`SyncSource`] capability so the collection itself stays plain data.

use async_trait::async_trait;

use crate::common::url::url_contains;
use crate::error::Result;
use crate::webdav::client::WebDavClient;
use crate::webdav::types::{DavCollection, DavObject};
use crate::webdav::xml::{DavNamespace, XmlElement, el};

/// Reconciliation strategy.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SyncMethod {
    /// RFC 6578 `sync-collection` with an opaque server cursor.
    WebDav,
    /// ctag comparison plus a full object listing.
    Basic,
}

/// Protocol half of the sync engine, implemented by the CalDAV and CardDAV
/// clients.
#[async_trait]
pub trait SyncSource: Send + Sync {
    /// Href suffix identifying member objects (`.ics` / `.vcf`).
    fn object_extension(&self) -> &'static str;

    /// The payload property requested from `sync-collection`
    /// (`c:calendar-data` / `card:address-data`).
    fn data_prop(&self) -> XmlElement;

    fn namespaces(&self) -> &'static [DavNamespace];

    /// Batch-fetch full `{etag, data}` for the given hrefs.
    async fn multiget(&self, collection_url: &str, hrefs: &[String]) -> Result<Vec<DavObject>>;

    /// Full object listing of the collection (the basic strategy's remote
    /// side).
    async fn fetch_objects(&self, collection: &DavCollection) -> Result<Vec<DavObject>>;
}

/// Outcome of one sync pass over one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncDiff {
    /// Remote objects with no local counterpart.
    pub created: Vec<DavObject>,
    /// Remote values of objects whose etag moved.
    pub updated: Vec<DavObject>,
    /// Url-only records of objects gone from the server.
    pub deleted: Vec<DavObject>,
    /// Local objects whose remote etag is unchanged.
    pub unchanged: Vec<DavObject>,
}

impl SyncDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.deleted.is_empty()
            && self.unchanged.is_empty()
    }

    /// The refreshed snapshot: `unchanged ∪ created ∪ updated`.
    pub fn merged_objects(&self) -> Vec<DavObject> {
        let mut merged =
            Vec::with_capacity(self.unchanged.len() + self.created.len() + self.updated.len());
        merged.extend(self.unchanged.iter().cloned());
        merged.extend(self.created.iter().cloned());
        merged.extend(self.updated.iter().cloned());
        merged
    }
}

/// A freshly synced collection plus the diff that produced it.
#[derive(Debug, Clone)]
pub struct SyncedCollection {
    pub collection: DavCollection,
    pub diff: SyncDiff,
}

fn etag_moved(local_obj: &DavObject, remote_obj: &DavObject) -> bool {
    remote_obj
        .etag
        .as_deref()
        .is_some_and(|etag| !etag.is_empty())
        && remote_obj.etag != local_obj.etag
}

/// Remote objects with no local counterpart, and the remote values of locals
/// whose etag moved. Shared by both strategies; `deleted` and `unchanged`
/// are strategy-specific.
pub(crate) fn created_and_updated(
    local: &[DavObject],
    remote: &[DavObject],
) -> (Vec<DavObject>, Vec<DavObject>) {
    let created = remote
        .iter()
        .filter(|remote_obj| {
            !local
                .iter()
                .any(|local_obj| url_contains(&local_obj.url, &remote_obj.url))
        })
        .cloned()
        .collect();

    let updated = local
        .iter()
        .filter_map(|local_obj| {
            remote
                .iter()
                .find(|remote_obj| url_contains(&remote_obj.url, &local_obj.url))
                .filter(|remote_obj| etag_moved(local_obj, remote_obj))
                .cloned()
        })
        .collect();

    (created, updated)
}

/// Reconcile one collection with the server.
///
/// Strategy: `method` when given, else WebDAV iff the collection's reports
/// include `syncCollection`, else Basic. Under the basic strategy a clean
/// ctag returns the input collection untouched with an empty diff.
pub async fn smart_collection_sync<S: SyncSource + ?Sized>(
    client: &WebDavClient,
    source: &S,
    collection: &DavCollection,
    method: Option<SyncMethod>,
) -> Result<SyncedCollection> {
    let method = method.unwrap_or(if collection.supports_sync_token() {
        SyncMethod::WebDav
    } else {
        SyncMethod::Basic
    });
    tracing::debug!(url = %collection.url, strategy = ?method, "sync.collection");

    match method {
        SyncMethod::WebDav => webdav_sync(client, source, collection).await,
        SyncMethod::Basic => basic_sync(client, source, collection).await,
    }
}

async fn webdav_sync<S: SyncSource + ?Sized>(
    client: &WebDavClient,
    source: &S,
    collection: &DavCollection,
) -> Result<SyncedCollection> {
    let props = vec![el("getetag"), source.data_prop(), el("displayname")];
    let result = client
        .sync_collection(
            &collection.url,
            props,
            1,
            collection.sync_token.as_deref(),
            source.namespaces(),
        )
        .await?;

    let extension = source.object_extension();
    let mut changed_hrefs = Vec::new();
    let mut deleted_hrefs = Vec::new();
    for response in &result.responses {
        let Some(href) = response.href.as_deref().map(str::trim) else {
            continue;
        };
        if !href.ends_with(extension) {
            continue;
        }
        if response.status == 404 {
            deleted_hrefs.push(href.to_string());
        } else {
            changed_hrefs.push(href.to_string());
        }
    }
    tracing::trace!(
        changed = changed_hrefs.len(),
        deleted = deleted_hrefs.len(),
        "sync.token_delta"
    );

    let remote = if changed_hrefs.is_empty() {
        Vec::new()
    } else {
        source.multiget(&collection.url, &changed_hrefs).await?
    };

    let (created, updated) = created_and_updated(&collection.objects, &remote);
    // A token delta only names what moved, so locals outside it are kept:
    // unchanged = locals neither deleted nor superseded by a remote etag.
    let unchanged = collection
        .objects
        .iter()
        .filter(|local_obj| {
            let deleted = deleted_hrefs
                .iter()
                .any(|href| url_contains(href, &local_obj.url));
            let superseded = remote.iter().any(|remote_obj| {
                url_contains(&remote_obj.url, &local_obj.url) && etag_moved(local_obj, remote_obj)
            });
            !deleted && !superseded
        })
        .cloned()
        .collect();
    let diff = SyncDiff {
        created,
        updated,
        deleted: deleted_hrefs
            .into_iter()
            .map(|url| DavObject {
                url,
                etag: None,
                data: None,
            })
            .collect(),
        unchanged,
    };

    let mut synced = collection.clone();
    synced.sync_token = result
        .sync_token
        .or_else(|| collection.sync_token.clone());
    synced.objects = diff.merged_objects();

    Ok(SyncedCollection {
        collection: synced,
        diff,
    })
}

async fn basic_sync<S: SyncSource + ?Sized>(
    client: &WebDavClient,
    source: &S,
    collection: &DavCollection,
) -> Result<SyncedCollection> {
    let dirty = client.is_collection_dirty(collection).await?;
    // Fetched regardless of dirtiness so a dirty collection diffs in the
    // same pass.
    let remote = source.fetch_objects(collection).await?;

    if !dirty.is_dirty {
        tracing::trace!(url = %collection.url, "sync.ctag_clean");
        return Ok(SyncedCollection {
            collection: collection.clone(),
            diff: SyncDiff::default(),
        });
    }

    let (created, updated) = created_and_updated(&collection.objects, &remote);
    // The full listing is in hand, so a local without a remote match is gone
    // and unchanged means a matching equal etag.
    let deleted = collection
        .objects
        .iter()
        .filter(|local_obj| {
            !remote
                .iter()
                .any(|remote_obj| url_contains(&remote_obj.url, &local_obj.url))
        })
        .cloned()
        .collect();
    let unchanged = collection
        .objects
        .iter()
        .filter(|local_obj| {
            remote.iter().any(|remote_obj| {
                url_contains(&local_obj.url, &remote_obj.url) && remote_obj.etag == local_obj.etag
            })
        })
        .cloned()
        .collect();
    let diff = SyncDiff {
        created,
        updated,
        deleted,
        unchanged,
    };

    let mut synced = collection.clone();
    synced.ctag = dirty.new_ctag;
    synced.objects = diff.merged_objects();

    Ok(SyncedCollection {
        collection: synced,
        diff,
    })
}
