//! Date window for an aggregation and the range filter applied to its events.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SubsecRound, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::event::ExpandedEvent;
use crate::time::{self, iso};

/// Inclusive `[start, end]` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    #[serde(with = "iso")]
    pub start: DateTime<Utc>,
    #[serde(with = "iso")]
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> EngineResult<Self> {
        if start > end {
            return Err(EngineError::InvalidWindow {
                start: iso::format(&start),
                end: iso::format(&end),
            });
        }
        Ok(Window {
            start: start.trunc_subsecs(3),
            end: end.trunc_subsecs(3),
        })
    }

    /// `[startOfToday, startOfToday + days]` in the local timezone.
    pub fn starting_today(now: DateTime<Utc>, tz: &Tz, days: i64) -> Self {
        let today = now.with_timezone(tz).date_naive();
        let start = time::local_midnight(tz, today);
        let end = time::local_midnight(tz, today + Duration::days(days));
        Window { start, end }
    }

    /// Build a window from optional caller-supplied bounds.
    ///
    /// Bounds are RFC 3339 timestamps or `YYYY-MM-DD` dates. A date start is
    /// local midnight; a date end is the last millisecond of that local day.
    /// A missing bound falls back to the default window.
    pub fn from_args(
        start: Option<&str>,
        end: Option<&str>,
        now: DateTime<Utc>,
        tz: &Tz,
        days: i64,
    ) -> EngineResult<Self> {
        let default = Self::starting_today(now, tz, days);

        let start = match start {
            Some(s) => parse_bound(s, tz, false)?,
            None => default.start,
        };
        let end = match end {
            Some(s) => parse_bound(s, tz, true)?,
            None => default.end,
        };

        Self::new(start, end)
    }

    /// Standard interval overlap; touching the boundary counts.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start <= self.end && end >= self.start
    }
}

fn parse_bound(s: &str, tz: &Tz, is_end: bool) -> EngineResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        EngineError::Config(format!(
            "Invalid date '{}'. Expected RFC 3339 or YYYY-MM-DD",
            s
        ))
    })?;

    if is_end {
        let next_midnight = time::local_midnight(tz, date + Duration::days(1));
        Ok(next_midnight - Duration::milliseconds(1))
    } else {
        Ok(time::localize(tz, date.and_time(NaiveTime::MIN)))
    }
}

/// Keep events overlapping `window` and put their instants in canonical
/// (millisecond) form. Order is preserved.
pub fn filter(events: Vec<ExpandedEvent>, window: &Window) -> Vec<ExpandedEvent> {
    events
        .into_iter()
        .filter(|e| window.overlaps(e.start, e.end))
        .map(|mut e| {
            e.start = e.start.trunc_subsecs(3);
            e.end = e.end.trunc_subsecs(3);
            e
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn chicago() -> Tz {
        "America/Chicago".parse().unwrap()
    }

    fn event(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> ExpandedEvent {
        ExpandedEvent {
            id: id.to_string(),
            title: id.to_string(),
            start,
            end,
            all_day: false,
            calendar_name: "Home".to_string(),
            location: None,
            description: None,
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_starting_today_uses_local_midnight() {
        // 03:00 UTC on Jan 9 is still Jan 8 in Chicago
        let window = Window::starting_today(utc(2024, 1, 9, 3, 0), &chicago(), 14);

        assert_eq!(window.start, utc(2024, 1, 8, 6, 0));
        assert_eq!(window.end, utc(2024, 1, 22, 6, 0));
    }

    #[test]
    fn test_new_rejects_inverted_window() {
        let result = Window::new(utc(2024, 1, 9, 0, 0), utc(2024, 1, 8, 0, 0));
        assert!(matches!(result, Err(EngineError::InvalidWindow { .. })));
    }

    #[test]
    fn test_from_args_dates() {
        let window = Window::from_args(
            Some("2024-01-08"),
            Some("2024-01-10"),
            utc(2024, 1, 1, 0, 0),
            &chicago(),
            14,
        )
        .unwrap();

        assert_eq!(window.start, utc(2024, 1, 8, 6, 0));
        assert_eq!(
            window.end,
            utc(2024, 1, 11, 6, 0) - Duration::milliseconds(1)
        );
    }

    #[test]
    fn test_from_args_rejects_garbage() {
        let result = Window::from_args(Some("next tuesday"), None, Utc::now(), &chicago(), 14);
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_filter_includes_boundary_touching_events() {
        let window = Window::new(utc(2024, 1, 8, 0, 0), utc(2024, 1, 9, 0, 0)).unwrap();
        let events = vec![
            event("ends-at-start", utc(2024, 1, 7, 23, 0), utc(2024, 1, 8, 0, 0)),
            event("starts-at-end", utc(2024, 1, 9, 0, 0), utc(2024, 1, 9, 1, 0)),
            event("before", utc(2024, 1, 7, 10, 0), utc(2024, 1, 7, 11, 0)),
            event("after", utc(2024, 1, 9, 0, 1), utc(2024, 1, 9, 1, 0)),
            event("spanning", utc(2024, 1, 1, 0, 0), utc(2024, 2, 1, 0, 0)),
        ];

        let ids: Vec<String> = filter(events, &window).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["ends-at-start", "starts-at-end", "spanning"]);
    }

    #[test]
    fn test_filter_truncates_to_millis() {
        let window = Window::new(utc(2024, 1, 8, 0, 0), utc(2024, 1, 9, 0, 0)).unwrap();
        let start = utc(2024, 1, 8, 10, 0) + Duration::nanoseconds(1_234_567);
        let filtered = filter(vec![event("a", start, start)], &window);

        assert_eq!(
            filtered[0].start,
            utc(2024, 1, 8, 10, 0) + Duration::milliseconds(1)
        );
    }
}
