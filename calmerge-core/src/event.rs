//! Event types flowing through the aggregation pipeline.
//!
//! Feeds are parsed into [`RawCalendarEvent`]s, which keep the ICS time form
//! (date-only, UTC, floating, zoned). The expander turns each raw event into
//! one or more [`ExpandedEvent`]s with concrete UTC instants, and the
//! aggregator wraps them into an [`AggregateResult`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::time::{self, iso};
use crate::window::Window;

/// A DTSTART/DTEND/EXDATE value as written in the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    /// `VALUE=DATE`, no time-of-day
    Date(NaiveDate),
    /// Trailing `Z`
    DateTimeUtc(DateTime<Utc>),
    /// No zone at all; interpreted in the local zone
    DateTimeFloating(NaiveDateTime),
    /// `TZID=...` parameter
    DateTimeZoned { datetime: NaiveDateTime, tzid: String },
}

impl EventTime {
    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// Resolve to an instant. Dates and floating times are read in `local`;
    /// zoned times use their TZID, or `local` if the TZID is not an IANA name.
    pub fn to_utc(&self, local: &Tz) -> DateTime<Utc> {
        match self {
            EventTime::Date(d) => time::local_midnight(local, *d),
            EventTime::DateTimeUtc(dt) => *dt,
            EventTime::DateTimeFloating(dt) => time::localize(local, *dt),
            EventTime::DateTimeZoned { datetime, tzid } => match tzid.parse::<Tz>() {
                Ok(tz) => time::localize(&tz, *datetime),
                Err(_) => {
                    tracing::debug!(tzid = %tzid, "Unknown TZID, using local timezone");
                    time::localize(local, *datetime)
                }
            },
        }
    }
}

/// One VEVENT as parsed from a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCalendarEvent {
    pub uid: String,
    pub title: String,
    pub start: EventTime,
    /// Equal to `start` when the feed gave neither DTEND nor DURATION
    pub end: EventTime,
    /// RRULE value, e.g. `FREQ=WEEKLY;BYDAY=MO`
    pub recurrence_rule: Option<String>,
    pub exclusion_dates: Vec<EventTime>,
    /// Set on instance overrides of a recurring series
    pub recurrence_id: Option<EventTime>,
    pub location: Option<String>,
    pub description: Option<String>,
    /// `STATUS:CANCELLED` on an instance override: the occurrence is removed
    /// from its series and nothing is shown in its place
    pub cancelled: bool,
}

impl RawCalendarEvent {
    /// The feed declared the start as a date without time-of-day.
    pub fn is_all_day_hint(&self) -> bool {
        self.start.is_date()
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence_rule.is_some()
    }
}

/// One concrete occurrence, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandedEvent {
    pub id: String,
    pub title: String,
    #[serde(with = "iso")]
    pub start: DateTime<Utc>,
    #[serde(with = "iso")]
    pub end: DateTime<Utc>,
    pub all_day: bool,
    #[serde(rename = "calendar")]
    pub calendar_name: String,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// The merged, sorted event list for one window plus its metadata.
///
/// Built once per aggregation and never mutated afterwards; the cache hands
/// out shared references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub events: Vec<ExpandedEvent>,
    pub meta: AggregateMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMeta {
    pub count: usize,
    /// Every configured source, including ones that failed or were empty
    pub calendars: Vec<String>,
    #[serde(with = "iso")]
    pub fetched_at: DateTime<Utc>,
    pub range: Window,
}
