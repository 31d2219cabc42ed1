//! Fan-out, expansion and merge.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use futures::future::join_all;

use crate::error::{EngineError, EngineResult};
use crate::event::{AggregateMeta, AggregateResult, EventTime, RawCalendarEvent};
use crate::fetch::{FeedFetcher, fetch};
use crate::recurrence::{Expander, RuleEvaluator};
use crate::source::CalendarSource;
use crate::window::{self, Window};

/// Settings shared by every source in one aggregation run.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub local: Tz,
    pub fetch_timeout: Duration,
    pub exdate_tolerance: chrono::Duration,
}

/// Fetch every source concurrently, expand, filter to `window` and sort.
///
/// All fetches run to completion (or their own timeout) before merging.
/// Failed sources contribute nothing but still appear in `meta.calendars`.
/// Events are ordered by start; ties keep source order, then feed order.
pub async fn aggregate<F: FeedFetcher>(
    fetcher: Arc<F>,
    evaluator: &dyn RuleEvaluator,
    sources: &[CalendarSource],
    window: &Window,
    options: &AggregateOptions,
) -> EngineResult<AggregateResult> {
    let handles = sources.iter().cloned().map(|source| {
        let fetcher = Arc::clone(&fetcher);
        let limit = options.fetch_timeout;
        tokio::spawn(async move { fetch(fetcher.as_ref(), &source, limit).await })
    });

    let fetched = join_all(handles).await;

    let expander =
        Expander::new(evaluator, options.local).with_exdate_tolerance(options.exdate_tolerance);

    let mut events = Vec::new();
    for (source, result) in sources.iter().zip(fetched) {
        let raw_events = match result {
            Ok(raw_events) => raw_events,
            Err(e) if e.is_panic() => {
                tracing::warn!(calendar = %source.name, "Fetch task panicked");
                Vec::new()
            }
            Err(e) => {
                return Err(EngineError::Aggregation(format!(
                    "fetch task for '{}' did not complete: {}",
                    source.name, e
                )));
            }
        };

        for raw in apply_overrides(raw_events) {
            events.extend(expander.expand(&raw, &source.name, window));
        }
    }

    let mut events = window::filter(events, window);
    events.sort_by_key(|e| e.start);

    Ok(AggregateResult {
        meta: AggregateMeta {
            count: events.len(),
            calendars: sources.iter().map(|s| s.name.clone()).collect(),
            fetched_at: Utc::now(),
            range: *window,
        },
        events,
    })
}

/// Fold RECURRENCE-ID overrides into their series: the overridden
/// occurrence is excluded from the master, the override itself is kept as a
/// standalone event unless it cancels the occurrence.
fn apply_overrides(mut events: Vec<RawCalendarEvent>) -> Vec<RawCalendarEvent> {
    let mut overridden: HashMap<String, Vec<EventTime>> = HashMap::new();
    for event in events.iter().filter(|e| !e.is_recurring()) {
        if let Some(rid) = &event.recurrence_id {
            overridden
                .entry(event.uid.clone())
                .or_default()
                .push(rid.clone());
        }
    }

    if !overridden.is_empty() {
        for event in events.iter_mut().filter(|e| e.is_recurring()) {
            if let Some(rids) = overridden.get(&event.uid) {
                event.exclusion_dates.extend(rids.iter().cloned());
            }
        }
    }

    events.retain(|e| !e.cancelled);
    events
}
