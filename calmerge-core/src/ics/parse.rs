//! Feed parsing using the icalendar crate's parser.

use chrono::Duration;
use icalendar::{
    DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

use crate::constants::UNTITLED_EVENT;
use crate::error::{FetchError, FetchResult};
use crate::event::{EventTime, RawCalendarEvent};

/// Parse a whole feed into raw events.
///
/// Only VEVENT components are returned; todos, journal entries, free/busy
/// blocks and timezone definitions are skipped. Cancelled events and events
/// without a usable DTSTART are dropped. `source_name` is used to synthesize
/// uids for events that lack one.
pub fn parse_feed(content: &str, source_name: &str) -> FetchResult<Vec<RawCalendarEvent>> {
    let content = content.trim_start_matches('\u{feff}').trim();
    if !content.starts_with("BEGIN:VCALENDAR") {
        return Err(FetchError::Parse("missing BEGIN:VCALENDAR".into()));
    }

    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| FetchError::Parse(e.to_string()))?;

    let events = calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .enumerate()
        .filter_map(|(index, vevent)| parse_vevent(vevent, source_name, index))
        .collect();

    Ok(events)
}

fn parse_vevent(vevent: &Component, source_name: &str, index: usize) -> Option<RawCalendarEvent> {
    let cancelled = vevent
        .find_prop("STATUS")
        .is_some_and(|p| p.val.as_ref().eq_ignore_ascii_case("CANCELLED"));

    let recurrence_id = vevent
        .find_prop("RECURRENCE-ID")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(to_event_time);

    // A cancelled instance override still has to knock its occurrence out
    // of the series; any other cancelled event is gone.
    if cancelled && recurrence_id.is_none() {
        return None;
    }

    let start = match vevent
        .find_prop("DTSTART")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
    {
        Some(dpt) => to_event_time(dpt),
        None if cancelled => recurrence_id.clone()?,
        None => return None,
    };

    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(to_event_time)
        .or_else(|| {
            let duration = parse_duration(vevent.find_prop("DURATION")?.val.as_ref())?;
            add_duration(&start, duration)
        })
        .unwrap_or_else(|| start.clone());

    let uid = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .filter(|uid| !uid.is_empty())
        .unwrap_or_else(|| format!("{}-{}", source_name, index));

    let title = text_prop(vevent, "SUMMARY").unwrap_or_else(|| UNTITLED_EVENT.to_string());

    let recurrence_rule = vevent.find_prop("RRULE").map(|p| p.val.to_string());
    let exclusion_dates: Vec<EventTime> = vevent
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(parse_exdate_property)
        .collect();

    Some(RawCalendarEvent {
        uid,
        title,
        start,
        end,
        recurrence_rule,
        exclusion_dates,
        recurrence_id,
        location: text_prop(vevent, "LOCATION"),
        description: text_prop(vevent, "DESCRIPTION"),
        cancelled,
    })
}

/// Convert icalendar's DatePerhapsTime to our EventTime, preserving timezone info
fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            icalendar::CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                EventTime::DateTimeZoned {
                    datetime: date_time,
                    tzid,
                }
            }
        },
    }
}

/// Parse an EXDATE property into a list of EventTime values.
///
/// Handles:
/// - TZID parameter: `EXDATE;TZID=America/New_York:20240108T100000`
/// - VALUE=DATE: `EXDATE;VALUE=DATE:20240108`
/// - UTC: `EXDATE:20240108T100000Z`
/// - Floating: `EXDATE:20240108T100000`
/// - Comma-separated values: `EXDATE;TZID=...:20240108T100000,20240115T100000`
fn parse_exdate_property(prop: &Property) -> Vec<EventTime> {
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            // Some producers omit VALUE=DATE on date-only lists
            if is_date || s.len() == 8 {
                return chrono::NaiveDate::parse_from_str(s, "%Y%m%d")
                    .ok()
                    .map(EventTime::Date);
            }
            if let Some(utc) = s.strip_suffix('Z') {
                return chrono::NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| EventTime::DateTimeUtc(dt.and_utc()));
            }
            let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").ok()?;
            Some(match &tzid {
                Some(tz) => EventTime::DateTimeZoned {
                    datetime: naive,
                    tzid: tz.clone(),
                },
                None => EventTime::DateTimeFloating(naive),
            })
        })
        .collect()
}

/// DURATION value (`PT1H30M`, `P1D`). Negative durations are ignored.
fn parse_duration(value: &str) -> Option<Duration> {
    if value.starts_with('-') {
        return None;
    }
    let duration = iso8601::duration(value.trim_start_matches('+')).ok()?;
    let std_duration: std::time::Duration = duration.into();
    Duration::from_std(std_duration).ok()
}

fn add_duration(start: &EventTime, duration: Duration) -> Option<EventTime> {
    Some(match start {
        EventTime::Date(d) => EventTime::Date(*d + Duration::days(duration.num_days())),
        EventTime::DateTimeUtc(dt) => EventTime::DateTimeUtc(*dt + duration),
        EventTime::DateTimeFloating(dt) => EventTime::DateTimeFloating(*dt + duration),
        EventTime::DateTimeZoned { datetime, tzid } => EventTime::DateTimeZoned {
            datetime: *datetime + duration,
            tzid: tzid.clone(),
        },
    })
}

/// A TEXT property with RFC 5545 escapes removed. Empty values count as absent.
fn text_prop(component: &Component, name: &str) -> Option<String> {
    let value = unescape_text(component.find_prop(name)?.val.as_ref());
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
