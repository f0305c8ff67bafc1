use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

pub use crate::webdav::types::{CreateAccountOptions, DavCollection, DavObject, Depth};

use crate::error::{DavError, Result};
use crate::webdav::types::DavAccount;

/// An object fetched from a calendar; `data` is iCalendar text.
pub type CalendarObject = DavObject;

/// iCalendar component kinds a calendar collection may hold.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CalendarComponent {
    VEvent,
    VTodo,
    VJournal,
    VFreeBusy,
    VTimezone,
    VAlarm,
}

impl CalendarComponent {
    pub const ALL: [CalendarComponent; 6] = [
        CalendarComponent::VEvent,
        CalendarComponent::VTodo,
        CalendarComponent::VJournal,
        CalendarComponent::VFreeBusy,
        CalendarComponent::VTimezone,
        CalendarComponent::VAlarm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CalendarComponent::VEvent => "VEVENT",
            CalendarComponent::VTodo => "VTODO",
            CalendarComponent::VJournal => "VJOURNAL",
            CalendarComponent::VFreeBusy => "VFREEBUSY",
            CalendarComponent::VTimezone => "VTIMEZONE",
            CalendarComponent::VAlarm => "VALARM",
        }
    }

    /// Parse a `supported-calendar-component-set` comp name; unknown
    /// components (e.g. `VMESSAGE`) yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|component| component.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

/// A CalDAV calendar collection.
#[derive(Debug, Clone, Default)]
pub struct Calendar {
    pub collection: DavCollection,
    pub description: Option<String>,
    /// iCalendar VTIMEZONE text, when the server publishes one.
    pub timezone: Option<String>,
    pub calendar_color: Option<String>,
    /// The server's component set intersected with [`CalendarComponent::ALL`].
    pub components: Vec<CalendarComponent>,
}

impl Calendar {
    pub fn url(&self) -> &str {
        &self.collection.url
    }
}

/// A bootstrapped CalDAV account with its cached calendar list.
#[derive(Debug, Clone)]
pub struct CalDavAccount {
    pub account: DavAccount,
    pub calendars: Vec<Calendar>,
}

/// Inclusive time window, ISO-8601 endpoints.
///
/// Accepted precisions: `YYYY-MM-DDTHH:MM:SS` with optional fraction and
/// `Z`/offset, or the date-only `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

impl TimeRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Validate both endpoints and convert to the CalDAV wire format
    /// (`YYYYMMDDTHHMMSSZ`, basic ISO-8601 in UTC).
    pub fn to_wire(&self) -> Result<(String, String)> {
        Ok((
            parse_iso8601(&self.start)?.format("%Y%m%dT%H%M%SZ").to_string(),
            parse_iso8601(&self.end)?.format("%Y%m%dT%H%M%SZ").to_string(),
        ))
    }
}

fn parse_iso8601(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| {
            DavError::InvalidTimeRange {
                value: value.to_string(),
            }
        })?;
        return Ok(Utc.from_utc_datetime(&midnight));
    }
    Err(DavError::InvalidTimeRange {
        value: value.to_string(),
    })
}

/// Options for [`fetch_calendar_objects`](crate::caldav::CalDavClient::fetch_calendar_objects).
#[derive(Default)]
pub struct FetchObjectsOptions {
    /// Skip the `calendar-query` and multiget exactly these URLs.
    pub object_urls: Option<Vec<String>>,
    /// Restrict the query to this window (must be ISO-8601).
    pub time_range: Option<TimeRange>,
    /// Ask the server to expand recurrences inside `time_range`.
    pub expand: bool,
    /// Keep only matching hrefs; defaults to `contains(".ics")`
    /// (`.vcf` on the CardDAV side).
    pub url_filter: Option<Box<dyn Fn(&str) -> bool + Send + Sync>>,
}

impl std::fmt::Debug for FetchObjectsOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchObjectsOptions")
            .field("object_urls", &self.object_urls)
            .field("time_range", &self.time_range)
            .field("expand", &self.expand)
            .field("url_filter", &self.url_filter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Outcome of a per-account calendar sync.
#[derive(Debug, Clone, Default)]
pub struct CalendarSyncResult {
    pub created: Vec<Calendar>,
    pub updated: Vec<Calendar>,
    pub deleted: Vec<Calendar>,
    pub unchanged: Vec<Calendar>,
}

impl CalendarSyncResult {
    /// Flatten to the surviving calendar list:
    /// `unchanged ∪ created ∪ updated`.
    pub fn into_calendars(self) -> Vec<Calendar> {
        let mut calendars =
            Vec::with_capacity(self.unchanged.len() + self.created.len() + self.updated.len());
        calendars.extend(self.unchanged);
        calendars.extend(self.created);
        calendars.extend(self.updated);
        calendars
    }
}
