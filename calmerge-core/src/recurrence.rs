//! Recurrence expansion.
//!
//! Rules are evaluated by a [`RuleEvaluator`] in "wall clock as UTC" space:
//! the rule is anchored at the event's local wall-clock start written with a
//! `Z` suffix, so a candidate's UTC calendar date is the local date of the
//! occurrence. [`Expander`] then rebuilds each occurrence in real time:
//!
//! - timed: candidate date + the original local time-of-day, resolved in the
//!   event's zone, with the original duration added for the end;
//! - all-day: local midnight of the candidate date, never UTC midnight.
//!
//! Occurrences within the exclusion tolerance of any EXDATE are dropped.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;

use crate::all_day::is_all_day;
use crate::constants::{DEFAULT_EXDATE_TOLERANCE, MAX_OCCURRENCES};
use crate::error::{ExpansionError, ExpansionResult};
use crate::event::{EventTime, ExpandedEvent, RawCalendarEvent};
use crate::time::{self, iso};
use crate::window::Window;

/// An RRULE anchored at a wall-clock start.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSpec {
    /// RRULE value with UNTIL already moved into wall-clock space
    pub rrule: String,
    pub dtstart: NaiveDateTime,
}

impl RuleSpec {
    /// `zone` is the zone `dtstart` is a wall-clock time in; it is used to
    /// translate a UTC `UNTIL` into the same frame.
    pub fn new(rrule: &str, dtstart: NaiveDateTime, zone: &Tz) -> Self {
        let rrule = rrule
            .trim()
            .split(';')
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once('=') {
                Some((key, value)) if key.eq_ignore_ascii_case("UNTIL") => {
                    format!("UNTIL={}", wall_clock_until(value, zone))
                }
                _ => part.to_string(),
            })
            .collect::<Vec<_>>()
            .join(";");

        RuleSpec { rrule, dtstart }
    }
}

fn wall_clock_until(value: &str, zone: &Tz) -> String {
    if let Some(utc) = value.strip_suffix('Z') {
        if let Ok(naive) = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S") {
            let local = time::wall_clock(zone, naive.and_utc());
            return format!("{}Z", local.format("%Y%m%dT%H%M%S"));
        }
        return value.to_string();
    }
    if value.len() == 8 {
        // Date-only UNTIL includes the whole day
        return format!("{}T235959Z", value);
    }
    format!("{}Z", value)
}

/// Produces candidate occurrence instants for a rule.
///
/// Implementations are pure; the expander owns exclusion matching and
/// local-time reconstruction.
pub trait RuleEvaluator: Send + Sync {
    /// Candidates within `[window_start, window_end]` (inclusive), in the
    /// same wall-clock-as-UTC frame as `rule.dtstart`.
    fn evaluate(
        &self,
        rule: &RuleSpec,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> ExpansionResult<Vec<DateTime<Utc>>>;
}

/// [`RuleEvaluator`] backed by the `rrule` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RRuleEvaluator;

impl RuleEvaluator for RRuleEvaluator {
    fn evaluate(
        &self,
        rule: &RuleSpec,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> ExpansionResult<Vec<DateTime<Utc>>> {
        if rule.rrule.is_empty() {
            return Err(ExpansionError::InvalidRule("empty RRULE string".to_string()));
        }

        let rrule_text = format!(
            "DTSTART:{}Z\nRRULE:{}",
            rule.dtstart.format("%Y%m%dT%H%M%S"),
            rule.rrule
        );

        let rrule_set: RRuleSet = rrule_text
            .parse()
            .map_err(|e| ExpansionError::InvalidRule(format!("{}", e)))?;

        // Pad by a second so both bounds are inclusive.
        let tz: rrule::Tz = Utc.into();
        let after = (window_start - Duration::seconds(1)).with_timezone(&tz);
        let before = (window_end + Duration::seconds(1)).with_timezone(&tz);

        let result = rrule_set.after(after).before(before).all(MAX_OCCURRENCES);

        Ok(result
            .dates
            .into_iter()
            .map(|dt| dt.with_timezone(&Utc))
            .filter(|dt| *dt >= window_start && *dt <= window_end)
            .collect())
    }
}

/// Turns raw events into concrete occurrences for one window.
pub struct Expander<'a> {
    evaluator: &'a dyn RuleEvaluator,
    local: Tz,
    exdate_tolerance: Duration,
}

impl<'a> Expander<'a> {
    pub fn new(evaluator: &'a dyn RuleEvaluator, local: Tz) -> Self {
        Expander {
            evaluator,
            local,
            exdate_tolerance: Duration::from_std(DEFAULT_EXDATE_TOLERANCE)
                .unwrap_or_else(|_| Duration::hours(1)),
        }
    }

    pub fn with_exdate_tolerance(mut self, tolerance: Duration) -> Self {
        self.exdate_tolerance = tolerance;
        self
    }

    /// Expand one raw event. A rule that cannot be evaluated is logged and
    /// yields no occurrences.
    pub fn expand(
        &self,
        event: &RawCalendarEvent,
        calendar_name: &str,
        window: &Window,
    ) -> Vec<ExpandedEvent> {
        match self.try_expand(event, calendar_name, window) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(
                    calendar = %calendar_name,
                    uid = %event.uid,
                    error = %e,
                    "Skipping event with unusable recurrence rule"
                );
                Vec::new()
            }
        }
    }

    pub fn try_expand(
        &self,
        event: &RawCalendarEvent,
        calendar_name: &str,
        window: &Window,
    ) -> ExpansionResult<Vec<ExpandedEvent>> {
        let all_day = is_all_day(event, &self.local);
        let start = event.start.to_utc(&self.local);
        let end = event.end.to_utc(&self.local).max(start);

        let rrule = match &event.recurrence_rule {
            Some(rrule) => rrule,
            None => {
                let id = match &event.recurrence_id {
                    Some(rid) => format!("{}-{}", event.uid, iso::format(&rid.to_utc(&self.local))),
                    None => event.uid.clone(),
                };
                return Ok(vec![self.instance(event, id, start, end, all_day, calendar_name)]);
            }
        };

        let zone = if all_day {
            self.local
        } else {
            self.event_zone(&event.start)?
        };

        let anchor = time::wall_clock(&zone, start);
        let rule = RuleSpec::new(rrule, anchor, &zone);
        let duration = end - start;

        // Candidates live in wall-clock space; widen to cover any UTC offset
        // and occurrences that start before the window but run into it.
        let eval_start = time::wall_clock(&zone, window.start).and_utc() - Duration::days(1) - duration;
        let eval_end = time::wall_clock(&zone, window.end).and_utc() + Duration::days(1);
        let candidates = self.evaluator.evaluate(&rule, eval_start, eval_end)?;

        let exclusions: Vec<Exclusion> = event
            .exclusion_dates
            .iter()
            .map(|x| Exclusion::from_event_time(x, &zone))
            .collect();

        let day_span = (time::wall_clock(&self.local, end).date()
            - time::wall_clock(&self.local, start).date())
        .num_days();

        let mut occurrences = Vec::new();
        for candidate in candidates {
            let date = candidate.date_naive();

            let (occ_start, occ_end) = if all_day {
                (
                    time::local_midnight(&self.local, date),
                    time::local_midnight(&self.local, date + Duration::days(day_span)),
                )
            } else {
                let occ_start = time::localize(&zone, date.and_time(anchor.time()));
                (occ_start, occ_start + duration)
            };

            if exclusions
                .iter()
                .any(|x| x.matches(occ_start, &zone, self.exdate_tolerance))
            {
                continue;
            }
            if !window.overlaps(occ_start, occ_end) {
                continue;
            }

            let id = format!("{}-{}", event.uid, iso::format(&occ_start));
            occurrences.push(self.instance(event, id, occ_start, occ_end, all_day, calendar_name));
        }

        Ok(occurrences)
    }

    /// Zone a timed rule repeats in: its TZID when that is a real zone,
    /// otherwise the local zone.
    fn event_zone(&self, start: &EventTime) -> ExpansionResult<Tz> {
        match start {
            EventTime::DateTimeZoned { tzid, .. } => match tzid.parse::<Tz>() {
                Ok(tz) => Ok(tz),
                Err(_) if tzid.trim().is_empty() => {
                    Err(ExpansionError::InvalidTimezone("empty TZID".to_string()))
                }
                Err(_) => Ok(self.local),
            },
            _ => Ok(self.local),
        }
    }

    fn instance(
        &self,
        event: &RawCalendarEvent,
        id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        all_day: bool,
        calendar_name: &str,
    ) -> ExpandedEvent {
        ExpandedEvent {
            id,
            title: event.title.clone(),
            start,
            end,
            all_day,
            calendar_name: calendar_name.to_string(),
            location: event.location.clone(),
            description: event.description.clone(),
        }
    }
}

enum Exclusion {
    Instant(DateTime<Utc>),
    Day(NaiveDate),
}

impl Exclusion {
    fn from_event_time(time: &EventTime, zone: &Tz) -> Self {
        match time {
            EventTime::Date(d) => Exclusion::Day(*d),
            other => Exclusion::Instant(other.to_utc(zone)),
        }
    }

    fn matches(&self, occurrence: DateTime<Utc>, zone: &Tz, tolerance: Duration) -> bool {
        match self {
            Exclusion::Instant(x) => (occurrence - *x).abs() <= tolerance,
            Exclusion::Day(d) => time::wall_clock(zone, occurrence).date() == *d,
        }
    }
}
