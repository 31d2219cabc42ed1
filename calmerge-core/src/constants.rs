use std::time::Duration;

/// How long an aggregated result is served before it is recomputed.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Per-feed request timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Length of the default window starting at local midnight today.
pub const DEFAULT_WINDOW_DAYS: i64 = 14;

/// Maximum distance between an EXDATE and a generated occurrence for the
/// occurrence to count as excluded.
pub const DEFAULT_EXDATE_TOLERANCE: Duration = Duration::from_secs(60 * 60);

/// Upper bound on occurrences generated for one rule in one window.
pub const MAX_OCCURRENCES: u16 = 1000;

pub const DEFAULT_BIND: &str = "127.0.0.1:3001";

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const UNTITLED_EVENT: &str = "Untitled Event";

pub const USER_AGENT: &str = concat!("calmerge/", env!("CARGO_PKG_VERSION"));
