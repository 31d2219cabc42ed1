//! All-day classification.

use chrono_tz::Tz;

use crate::event::RawCalendarEvent;
use crate::time;

/// An event is all-day if its start was written as a date, or if both its
/// start and end fall exactly on local midnight.
pub fn is_all_day(event: &RawCalendarEvent, local: &Tz) -> bool {
    if event.is_all_day_hint() {
        return true;
    }

    time::is_local_midnight(local, event.start.to_utc(local))
        && time::is_local_midnight(local, event.end.to_utc(local))
}
