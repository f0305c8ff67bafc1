use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::common::auth::Credentials;
use crate::common::http::{HttpResponse, HttpTransport};
use crate::common::url::{href_path, resolve_href, url_contains};
use crate::error::{Result, require_fields};
use crate::webdav::client::{WebDavClient, dav_method};
use crate::webdav::parser::{DavResponse, Multistatus, PropValue, map_objects};
use crate::webdav::sync::{SyncDiff, SyncMethod, SyncSource, smart_collection_sync};
use crate::webdav::types::{AccountType, DavAccount, DavCollection, DavObject, DavRequest, Depth};
use crate::webdav::xml::{DavNamespace, XmlElement, el};

use crate::caldav::types::{
    CalDavAccount, Calendar, CalendarComponent, CalendarObject, CalendarSyncResult,
    CreateAccountOptions, FetchObjectsOptions, TimeRange,
};

const CALDAV_NS: &[DavNamespace] = &[DavNamespace::Dav, DavNamespace::CalDav];
const REPORT_SET_CONCURRENCY: usize = 8;

/// CalDAV client: account bootstrap, calendar enumeration, object fetch and
/// mutation, and incremental sync, layered on [`WebDavClient`].
///
/// Cloning is cheap and shares the underlying connection pool.
///
/// # Example
/// ```no_run
/// use dav_sync_rs::caldav::{CalDavClient, CreateAccountOptions};
/// use dav_sync_rs::common::Credentials;
///
/// # async fn example() -> dav_sync_rs::error::Result<()> {
/// let client = CalDavClient::new(Some(Credentials::basic("user01", "secret")))?;
/// let account = client
///     .create_account(
///         "https://cal.example.com",
///         CreateAccountOptions { load_collections: true, load_objects: false },
///     )
///     .await?;
/// for calendar in &account.calendars {
///     println!("{:?}", calendar.collection.display_name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CalDavClient {
    dav: WebDavClient,
}

impl CalDavClient {
    pub fn new(credentials: Option<Credentials>) -> Result<Self> {
        Ok(Self {
            dav: WebDavClient::new(credentials)?,
        })
    }

    /// Build over a caller-supplied transport (tests script one).
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

    /// The underlying WebDAV client, for raw PROPFIND/REPORT access.
    pub fn webdav(&self) -> &WebDavClient {
        &self.dav
    }

    /// Discover the account and optionally load its calendars and their
    /// object snapshots.
    pub async fn create_account(
        &self,
        server_url: &str,
        options: CreateAccountOptions,
    ) -> Result<CalDavAccount> {
        let account = self
            .dav
            .discover_account(AccountType::CalDav, server_url)
            .await?;

        let mut calendars = if options.load_collections || options.load_objects {
            self.fetch_calendars(&account).await?
        } else {
            Vec::new()
        };

        if options.load_objects {
            let snapshots = join_all(calendars.iter().map(|calendar| {
                self.fetch_objects_from(&calendar.collection.url, FetchObjectsOptions::default())
            }))
            .await;
            for (calendar, objects) in calendars.iter_mut().zip(snapshots) {
                calendar.collection.objects = objects?;
            }
        }

        Ok(CalDavAccount { account, calendars })
    }

    /// Enumerate the calendars under the account's home set.
    ///
    /// Collections whose `supported-calendar-component-set` shares nothing
    /// with the iCalendar component set are filtered out. Each surviving
    /// calendar gets its `reports` attached via one `supported-report-set`
    /// probe, fanned out with bounded concurrency.
    pub async fn fetch_calendars(&self, account: &DavAccount) -> Result<Vec<Calendar>> {
        require_fields(&[
            ("home_url", !account.home_url.is_empty()),
            ("root_url", !account.root_url.is_empty()),
        ])?;

        let props = vec![
            el("c:calendar-description"),
            el("c:calendar-timezone"),
            el("displayname"),
            el("ca:calendar-color"),
            el("cs:getctag"),
            el("resourcetype"),
            el("c:supported-calendar-component-set"),
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
                    DavNamespace::CalDav,
                    DavNamespace::CalendarServer,
                    DavNamespace::AppleIcal,
                ],
            )
            .await?;

        let mut calendars = Vec::new();
        for response in &result.responses {
            let Some(href) = response.href.as_deref() else {
                continue;
            };
            let resource_type: Vec<String> = response
                .prop("resourcetype")
                .map(|value| value.keys().iter().map(|key| key.to_string()).collect())
                .unwrap_or_default();
            if !resource_type.iter().any(|tag| tag == "calendar") {
                continue;
            }

            let components: Vec<CalendarComponent> = response
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
                .filter_map(CalendarComponent::from_name)
                .collect();
            if components.is_empty() {
                tracing::trace!(href = %href, "calendar.no_ical_components");
                continue;
            }

            calendars.push(Calendar {
                collection: DavCollection {
                    url: resolve_href(&account.root_url, href)?,
                    ctag: response.prop_string("getctag"),
                    sync_token: response.prop_string("syncToken"),
                    display_name: response.prop_string("displayname"),
                    resource_type,
                    reports: Vec::new(),
                    objects: Vec::new(),
                },
                description: response.prop_string("calendarDescription"),
                timezone: response.prop_string("calendarTimezone"),
                calendar_color: response.prop_string("calendarColor"),
                components,
            });
        }

        let semaphore = Arc::new(Semaphore::new(REPORT_SET_CONCURRENCY));
        let report_sets = join_all(calendars.iter().map(|calendar| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                self.dav
                    .supported_report_set(&calendar.collection.url)
                    .await
            }
        }))
        .await;
        for (calendar, reports) in calendars.iter_mut().zip(report_sets) {
            calendar.collection.reports = reports?;
        }

        Ok(calendars)
    }

    /// Fetch objects from a calendar, either the URLs the caller names or
    /// the result of a `calendar-query` (default filter `VCALENDAR/VEVENT`,
    /// optionally time-bounded), batched through `calendar-multiget`.
    pub async fn fetch_calendar_objects(
        &self,
        calendar: &Calendar,
        options: FetchObjectsOptions,
    ) -> Result<Vec<CalendarObject>> {
        self.fetch_objects_from(&calendar.collection.url, options)
            .await
    }

    pub(crate) async fn fetch_objects_from(
        &self,
        collection_url: &str,
        options: FetchObjectsOptions,
    ) -> Result<Vec<DavObject>> {
        let wire_range = options
            .time_range
            .as_ref()
            .map(TimeRange::to_wire)
            .transpose()?;

        let hrefs = match options.object_urls {
            Some(urls) => urls,
            None => {
                let mut component_filter = el("c:comp-filter").attr("name", "VEVENT");
                if let Some((start, end)) = &wire_range {
                    component_filter = component_filter.child(
                        el("c:time-range")
                            .attr("start", start.as_str())
                            .attr("end", end.as_str()),
                    );
                }
                let body = el("c:calendar-query")
                    .child(el("prop").child(el("getetag")))
                    .child(
                        el("c:filter").child(
                            el("c:comp-filter")
                                .attr("name", "VCALENDAR")
                                .child(component_filter),
                        ),
                    );
                let result = self
                    .dav
                    .collection_query(
                        collection_url,
                        body,
                        Some(Depth::One),
                        CALDAV_NS,
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
                None => href.contains(".ics"),
            };
            if !keep {
                continue;
            }
            paths.push(href_path(&resolve_href(collection_url, href)?));
        }
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let expand = options
            .expand
            .then_some(wire_range)
            .flatten();
        self.calendar_multiget(collection_url, &paths, expand.as_ref())
            .await
    }

    /// `calendar-multiget` REPORT for a batch of object URLs, requesting
    /// `getetag` and `calendar-data` (expanded within `expand` when given).
    pub async fn calendar_multiget(
        &self,
        collection_url: &str,
        hrefs: &[String],
        expand: Option<&(String, String)>,
    ) -> Result<Vec<CalendarObject>> {
        if hrefs.is_empty() {
            return Ok(Vec::new());
        }

        let mut data_prop = el("c:calendar-data");
        if let Some((start, end)) = expand {
            data_prop = data_prop.child(
                el("c:expand")
                    .attr("start", start.as_str())
                    .attr("end", end.as_str()),
            );
        }
        let body = el("c:calendar-multiget")
            .child(el("prop").child(el("getetag")).child(data_prop))
            .children(hrefs.iter().map(|href| el("href").text(href.as_str())));

        let result = self
            .dav
            .collection_query(
                collection_url,
                body,
                Some(Depth::One),
                CALDAV_NS,
                Some(DavNamespace::Dav),
            )
            .await?;
        map_objects(collection_url, &result, "calendarData")
    }

    /// `MKCALENDAR` with a `<set><prop>` body.
    pub async fn make_calendar(
        &self,
        url: &str,
        props: Vec<XmlElement>,
        depth: Option<Depth>,
    ) -> Result<Multistatus> {
        let body = el("c:mkcalendar").child(el("set").child(el("prop").children(props)));
        let mut request = DavRequest::new(dav_method("MKCALENDAR")?, url)
            .namespaces(CALDAV_NS)
            .body(body);
        if let Some(depth) = depth {
            request = request.depth(depth);
        }
        self.dav.dav_request(request).await
    }

    /// `free-busy-query` REPORT; the first (usually only) response envelope.
    pub async fn free_busy_query(
        &self,
        url: &str,
        time_range: &TimeRange,
    ) -> Result<Option<DavResponse>> {
        let (start, end) = time_range.to_wire()?;
        let body = el("c:free-busy-query")
            .child(el("c:time-range").attr("start", start).attr("end", end));
        let result = self
            .dav
            .collection_query(
                url,
                body,
                Some(Depth::Zero),
                CALDAV_NS,
                Some(DavNamespace::Dav),
            )
            .await?;
        Ok(result.responses.into_iter().next())
    }

    /// Create an object in the calendar; fails if `filename` already exists.
    pub async fn create_calendar_object(
        &self,
        calendar: &Calendar,
        filename: &str,
        data: impl Into<String>,
    ) -> Result<HttpResponse> {
        let url = resolve_href(calendar.url(), filename)?;
        self.dav
            .create_object(&url, data, "text/calendar; charset=utf-8")
            .await
    }

    /// Replace an object, guarded by its etag when present.
    pub async fn update_calendar_object(&self, object: &CalendarObject) -> Result<HttpResponse> {
        self.dav
            .update_object(
                &object.url,
                object.data.clone().unwrap_or_default(),
                object.etag.as_deref(),
                "text/calendar; charset=utf-8",
            )
            .await
    }

    /// Delete an object, guarded by its etag when present.
    pub async fn delete_calendar_object(&self, object: &CalendarObject) -> Result<HttpResponse> {
        self.dav
            .delete_object(&object.url, object.etag.as_deref())
            .await
    }

    /// Reconcile one calendar with the server; see
    /// [`smart_collection_sync`].
    pub async fn smart_calendar_sync(
        &self,
        calendar: &Calendar,
        method: Option<SyncMethod>,
    ) -> Result<(Calendar, SyncDiff)> {
        let outcome =
            smart_collection_sync(&self.dav, self, &calendar.collection, method).await?;
        Ok((
            Calendar {
                collection: outcome.collection,
                ..calendar.clone()
            },
            outcome.diff,
        ))
    }

    /// Reconcile the account's calendar *list*: diff a fresh
    /// [`fetch_calendars`](Self::fetch_calendars) against `old_calendars`,
    /// then token-sync every calendar whose `sync_token` or `ctag` moved, in
    /// parallel.
    pub async fn sync_calendars(
        &self,
        account: &DavAccount,
        old_calendars: &[Calendar],
    ) -> Result<CalendarSyncResult> {
        let remote = self.fetch_calendars(account).await?;

        let created: Vec<Calendar> = remote
            .iter()
            .filter(|remote_cal| {
                !old_calendars
                    .iter()
                    .any(|local_cal| url_contains(local_cal.url(), remote_cal.url()))
            })
            .cloned()
            .collect();

        let deleted: Vec<Calendar> = old_calendars
            .iter()
            .filter(|local_cal| {
                !remote
                    .iter()
                    .any(|remote_cal| url_contains(remote_cal.url(), local_cal.url()))
            })
            .cloned()
            .collect();

        let mut unchanged = Vec::new();
        let mut changed: Vec<&Calendar> = Vec::new();
        for local_cal in old_calendars {
            let Some(remote_cal) = remote
                .iter()
                .find(|remote_cal| url_contains(remote_cal.url(), local_cal.url()))
            else {
                continue;
            };
            let moved = remote_cal.collection.sync_token != local_cal.collection.sync_token
                || remote_cal.collection.ctag != local_cal.collection.ctag;
            if moved {
                changed.push(local_cal);
            } else {
                unchanged.push(local_cal.clone());
            }
        }
        tracing::debug!(
            created = created.len(),
            changed = changed.len(),
            deleted = deleted.len(),
            "sync.calendars"
        );

        let outcomes = join_all(changed.iter().map(|local_cal| {
            smart_collection_sync(
                &self.dav,
                self,
                &local_cal.collection,
                Some(SyncMethod::WebDav),
            )
        }))
        .await;

        let mut updated = Vec::with_capacity(changed.len());
        for (local_cal, outcome) in changed.iter().zip(outcomes) {
            let outcome = outcome?;
            updated.push(Calendar {
                collection: outcome.collection,
                ..(*local_cal).clone()
            });
        }

        Ok(CalendarSyncResult {
            created,
            updated,
            deleted,
            unchanged,
        })
    }
}

#[async_trait]
impl SyncSource for CalDavClient {
    fn object_extension(&self) -> &'static str {
        ".ics"
    }

    fn data_prop(&self) -> XmlElement {
        el("c:calendar-data")
    }

    fn namespaces(&self) -> &'static [DavNamespace] {
        CALDAV_NS
    }

    async fn multiget(&self, collection_url: &str, hrefs: &[String]) -> Result<Vec<DavObject>> {
        let mut paths = Vec::with_capacity(hrefs.len());
        for href in hrefs {
            paths.push(href_path(&resolve_href(collection_url, href)?));
        }
        self.calendar_multiget(collection_url, &paths, None).await
    }

    async fn fetch_objects(&self, collection: &DavCollection) -> Result<Vec<DavObject>> {
        self.fetch_objects_from(&collection.url, FetchObjectsOptions::default())
            .await
    }
}
