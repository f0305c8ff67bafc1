pub mod client;
pub mod types;

pub use client::CalDavClient;
pub use types::{
    CalDavAccount, Calendar, CalendarComponent, CalendarObject, CalendarSyncResult,
    CreateAccountOptions, FetchObjectsOptions, TimeRange,
};
