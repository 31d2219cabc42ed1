//! Public entry point: cached access to the aggregated event list.

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::aggregate::{AggregateOptions, aggregate};
use crate::cache::{CacheState, TtlCache};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::event::AggregateResult;
use crate::fetch::{FeedFetcher, HttpFeedFetcher};
use crate::recurrence::{RRuleEvaluator, RuleEvaluator};
use crate::source::SourceRegistry;
use crate::window::Window;

/// Aggregates the configured feeds and serves the result from a TTL cache.
///
/// Concurrent misses are coalesced: one caller recomputes while the others
/// wait on the refresh lock and then read the fresh entry. A refresh that
/// overlaps [`invalidate_cache`](Self::invalidate_cache) is not cached.
pub struct CalendarEngine<F: FeedFetcher = HttpFeedFetcher> {
    registry: SourceRegistry,
    fetcher: Arc<F>,
    evaluator: Arc<dyn RuleEvaluator>,
    cache: TtlCache,
    refresh: Mutex<()>,
    options: AggregateOptions,
    window_days: i64,
}

impl CalendarEngine<HttpFeedFetcher> {
    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        let fetcher = HttpFeedFetcher::new(config.fetch_timeout)
            .map_err(|e| EngineError::Config(format!("Could not build HTTP client: {}", e)))?;
        Self::new(config.registry()?, fetcher, config)
    }
}

impl<F: FeedFetcher> CalendarEngine<F> {
    pub fn new(registry: SourceRegistry, fetcher: F, config: &EngineConfig) -> EngineResult<Self> {
        Ok(CalendarEngine {
            registry,
            fetcher: Arc::new(fetcher),
            evaluator: Arc::new(RRuleEvaluator),
            cache: TtlCache::new(config.cache_ttl),
            refresh: Mutex::new(()),
            options: AggregateOptions {
                local: config.local_timezone()?,
                fetch_timeout: config.fetch_timeout,
                exdate_tolerance: config.exdate_tolerance(),
            },
            window_days: config.window_days,
        })
    }

    /// Swap the recurrence rule evaluator.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn RuleEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn local_timezone(&self) -> Tz {
        self.options.local
    }

    pub fn window_days(&self) -> i64 {
        self.window_days
    }

    /// `[startOfToday, startOfToday + window_days]` in local time.
    pub fn default_window(&self) -> Window {
        Window::starting_today(Utc::now(), &self.options.local, self.window_days)
    }

    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    /// The aggregate for `window` (default window when `None`), from cache
    /// when a valid entry for that window exists.
    pub async fn get_aggregated_events(
        &self,
        window: Option<Window>,
    ) -> EngineResult<Arc<AggregateResult>> {
        let window = window.unwrap_or_else(|| self.default_window());
        let seen = self.cache.generation();

        if let Some(cached) = self.cache.get_for(&window) {
            tracing::debug!("Returning cached calendar data");
            return Ok(cached);
        }

        let _guard = self.refresh.lock().await;

        // Another caller may have refreshed while we waited. Only an entry
        // stored after any invalidation we observed counts.
        if let Some(cached) = self.cache.get_since(&window, seen) {
            tracing::debug!("Returning calendar data refreshed by a concurrent request");
            return Ok(cached);
        }

        let generation = self.cache.generation();

        tracing::info!(
            calendars = self.registry.len(),
            "Fetching fresh calendar data from all sources"
        );
        let started = Instant::now();

        let result = aggregate(
            Arc::clone(&self.fetcher),
            self.evaluator.as_ref(),
            self.registry.sources(),
            &window,
            &self.options,
        )
        .await?;

        tracing::info!(
            events = result.meta.count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Calendar aggregation complete"
        );

        Ok(self.cache.put(result, generation))
    }

    /// Clear the cached result; the next read always recomputes.
    pub fn invalidate_cache(&self) {
        tracing::info!("Calendar cache cleared");
        self.cache.invalidate();
    }
}
