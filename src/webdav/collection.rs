//! Collection-level operations: REPORT queries, collection creation, the
//! supported-report-set probe, and the two change witnesses (ctag and
//! sync-token).

use crate::common::url::url_contains;
use crate::error::{DavError, Result};
use crate::webdav::client::{WebDavClient, dav_method};
use crate::webdav::parser::{Multistatus, PropValue};
use crate::webdav::types::{CollectionDirtyState, DavCollection, DavRequest, Depth};
use crate::webdav::xml::{DavNamespace, XmlElement, el};

impl WebDavClient {
    /// Generic collection `REPORT`. A single response carrying no decoded
    /// body (some servers answer an empty 207 to an empty result set) is
    /// normalized to an empty response list.
    pub async fn collection_query(
        &self,
        url: &str,
        body: XmlElement,
        depth: Option<Depth>,
        namespaces: &[DavNamespace],
        default_namespace: Option<DavNamespace>,
    ) -> Result<Multistatus> {
        let result = self
            .report(url, body, depth, namespaces, default_namespace)
            .await?;
        if result.responses.len() == 1 && result.responses[0].raw.is_empty_value() {
            return Ok(Multistatus {
                responses: Vec::new(),
                sync_token: result.sync_token,
            });
        }
        Ok(result)
    }

    /// `MKCOL`, with an optional `<set><prop>` body.
    pub async fn make_collection(
        &self,
        url: &str,
        props: Option<Vec<XmlElement>>,
        depth: Option<Depth>,
    ) -> Result<Multistatus> {
        let mut request = DavRequest::new(dav_method("MKCOL")?, url);
        if let Some(depth) = depth {
            request = request.depth(depth);
        }
        if let Some(props) = props {
            request = request.body(el("mkcol").child(el("set").child(el("prop").children(props))));
        }
        self.dav_request(request).await
    }

    /// Report names the collection advertises via `supported-report-set`,
    /// camelCased (`syncCollection`, `calendarMultiget`, ...).
    pub async fn supported_report_set(&self, collection_url: &str) -> Result<Vec<String>> {
        let result = self
            .propfind(
                collection_url,
                vec![el("supported-report-set")],
                Depth::Zero,
                &[DavNamespace::Dav],
            )
            .await?;

        let mut reports = Vec::new();
        if let Some(response) = result.responses.first()
            && let Some(set) = response.prop("supportedReportSet")
        {
            for supported in set
                .get("supportedReport")
                .map(PropValue::as_list)
                .unwrap_or_default()
            {
                if let Some(name) = supported.get("report").and_then(PropValue::first_key) {
                    reports.push(name.to_string());
                }
            }
        }
        Ok(reports)
    }

    /// Probe the CalendarServer `getctag` and compare it with the snapshot's.
    pub async fn is_collection_dirty(
        &self,
        collection: &DavCollection,
    ) -> Result<CollectionDirtyState> {
        let result = self
            .propfind(
                &collection.url,
                vec![el("cs:getctag")],
                Depth::Zero,
                &[DavNamespace::Dav, DavNamespace::CalendarServer],
            )
            .await?;

        let matched = result
            .responses
            .iter()
            .find(|response| {
                response
                    .href
                    .as_deref()
                    .is_some_and(|href| url_contains(&collection.url, href))
            })
            .ok_or_else(|| DavError::CollectionNotFound {
                url: collection.url.clone(),
            })?;

        let new_ctag = matched.prop_string("getctag");
        Ok(CollectionDirtyState {
            is_dirty: collection.ctag != new_ctag,
            new_ctag,
        })
    }

    /// RFC 6578 `sync-collection` REPORT. `sync_token` is the cursor from the
    /// previous pass (sent empty on the first); the server's next cursor is
    /// returned in [`Multistatus::sync_token`].
    pub async fn sync_collection(
        &self,
        url: &str,
        props: Vec<XmlElement>,
        sync_level: u32,
        sync_token: Option<&str>,
        namespaces: &[DavNamespace],
    ) -> Result<Multistatus> {
        let token_el = match sync_token {
            Some(token) => el("sync-token").text(token),
            None => el("sync-token"),
        };
        let body = el("sync-collection")
            .child(token_el)
            .child(el("sync-level").text(sync_level.to_string()))
            .child(el("prop").children(props));

        self.dav_request(
            DavRequest::new(dav_method("REPORT")?, url)
                .namespaces(namespaces)
                .body(body),
        )
        .await
    }
}
