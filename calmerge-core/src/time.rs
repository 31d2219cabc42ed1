//! Local/UTC conversions shared by the expander, the window and the wire format.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Resolve a wall-clock time in `tz` to a UTC instant.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant. Times that
/// fall into a DST gap are pushed forward by the gap, the way calendar clients
/// display them.
pub fn localize(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => match tz.from_local_datetime(&(naive + Duration::hours(1))) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
            LocalResult::None => naive.and_utc(),
        },
    }
}

/// Local midnight of `date` in `tz`, as a UTC instant.
pub fn local_midnight(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    localize(tz, date.and_time(NaiveTime::MIN))
}

/// Wall-clock time of `instant` in `tz`.
pub fn wall_clock(tz: &Tz, instant: DateTime<Utc>) -> NaiveDateTime {
    instant.with_timezone(tz).naive_local()
}

/// True when `instant` falls exactly on midnight in `tz`.
pub fn is_local_midnight(tz: &Tz, instant: DateTime<Utc>) -> bool {
    wall_clock(tz, instant).time() == NaiveTime::MIN
}

/// Serde adapter writing instants as ISO-8601 UTC with millisecond precision
/// (`2024-01-08T15:00:00.000Z`).
pub mod iso {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn test_local_midnight_behind_utc() {
        let tz: Tz = "America/Chicago".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();

        assert_eq!(
            local_midnight(&tz, date),
            Utc.with_ymd_and_hms(2024, 1, 8, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_localize_spring_forward_gap() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let naive = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();

        // 02:30 does not exist; shown as 03:30 EDT
        assert_eq!(
            localize(&tz, naive),
            Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_localize_fall_back_takes_earlier() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let naive = NaiveDate::from_ymd_opt(2024, 11, 3)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();

        assert_eq!(
            localize(&tz, naive),
            Utc.with_ymd_and_hms(2024, 11, 3, 5, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_iso_format_has_millis_and_z() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 8, 15, 0, 0).unwrap();
        assert_eq!(iso::format(&dt), "2024-01-08T15:00:00.000Z");
    }
}
