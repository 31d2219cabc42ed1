//! Calendar aggregation and recurrence expansion.
//!
//! Fetches many ICS feeds concurrently, expands recurring events into
//! concrete occurrences inside a date window, merges everything into one
//! sorted list and serves it from a TTL cache.
//!
//! ## Modules
//!
//! - [`source`]: configured feeds
//! - [`ics`]: feed text → raw events
//! - [`fetch`]: per-source retrieval with failure isolation
//! - [`recurrence`]: RRULE expansion, EXDATE matching, local-time rebuild
//! - [`window`]: date window and range filter
//! - [`aggregate`]: concurrent fan-out and stable merge
//! - [`cache`]: single-slot TTL cache
//! - [`engine`]: the cached public entry point

pub mod aggregate;
pub mod all_day;
pub mod cache;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod event;
pub mod fetch;
pub mod ics;
pub mod recurrence;
pub mod source;
pub mod time;
pub mod window;

pub use cache::CacheState;
pub use config::EngineConfig;
pub use engine::CalendarEngine;
pub use error::{EngineError, EngineResult, ExpansionError, FetchError};
pub use event::{AggregateMeta, AggregateResult, EventTime, ExpandedEvent, RawCalendarEvent};
pub use fetch::{FeedFetcher, HttpFeedFetcher};
pub use recurrence::{RRuleEvaluator, RuleEvaluator, RuleSpec};
pub use source::{CalendarSource, SourceRegistry};
pub use window::Window;
