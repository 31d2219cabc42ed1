//! Single-slot TTL cache for the aggregate result.
//!
//! The slot holds `(result, stored_at)` as one value behind a lock. Writers
//! replace the whole entry; readers clone the `Arc` and never see a
//! half-written result.
//!
//! Every [`invalidate`](TtlCache::invalidate) bumps a generation counter.
//! A refresh reads the generation before it starts fetching and hands it to
//! [`put`](TtlCache::put); if the cache was invalidated in the meantime the
//! result is returned to that caller but not stored.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;

use crate::event::AggregateResult;
use crate::window::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    Valid,
    /// Present but older than the TTL; the next read misses.
    Stale,
}

#[derive(Debug)]
struct CacheEntry {
    result: Arc<AggregateResult>,
    stored_at: Instant,
    generation: u64,
}

#[derive(Debug, Default)]
struct Slot {
    entry: Option<CacheEntry>,
    generation: u64,
}

#[derive(Debug)]
pub struct TtlCache {
    ttl: Duration,
    slot: RwLock<Slot>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            slot: RwLock::new(Slot::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of invalidations so far.
    pub fn generation(&self) -> u64 {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// The stored result, if it is younger than the TTL.
    pub fn get(&self) -> Option<Arc<AggregateResult>> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        slot.entry
            .as_ref()
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.result))
    }

    /// Like [`get`](Self::get), but only hits when the stored result was
    /// computed for `window`.
    pub fn get_for(&self, window: &Window) -> Option<Arc<AggregateResult>> {
        self.get_since(window, 0)
    }

    /// Like [`get_for`](Self::get_for), restricted to entries stored at or
    /// after `generation`.
    pub fn get_since(&self, window: &Window, generation: u64) -> Option<Arc<AggregateResult>> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        slot.entry
            .as_ref()
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .filter(|entry| entry.generation >= generation)
            .filter(|entry| entry.result.meta.range == *window)
            .map(|entry| Arc::clone(&entry.result))
    }

    /// Store `result` and restart its TTL, unless the cache was invalidated
    /// after `generation` was read. The result is handed back either way.
    pub fn put(&self, result: AggregateResult, generation: u64) -> Arc<AggregateResult> {
        let result = Arc::new(result);
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);

        if slot.generation != generation {
            tracing::debug!(
                started = generation,
                current = slot.generation,
                "Cache invalidated during refresh, not storing result"
            );
            return result;
        }

        slot.entry = Some(CacheEntry {
            result: Arc::clone(&result),
            stored_at: Instant::now(),
            generation,
        });
        result
    }

    /// Drop the stored result; the next read misses regardless of TTL, and
    /// refreshes already in flight will not store theirs.
    pub fn invalidate(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.entry = None;
        slot.generation += 1;
    }

    pub fn state(&self) -> CacheState {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        match slot.entry.as_ref() {
            None => CacheState::Empty,
            Some(entry) if entry.stored_at.elapsed() < self.ttl => CacheState::Valid,
            Some(_) => CacheState::Stale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AggregateMeta;
    use chrono::{TimeZone, Utc};

    fn window(day: u32) -> Window {
        Window::new(
            Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, day + 14, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn result(window: Window) -> AggregateResult {
        AggregateResult {
            events: vec![],
            meta: AggregateMeta {
                count: 0,
                calendars: vec!["Home".to_string()],
                fetched_at: Utc::now(),
                range: window,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_empty_valid_stale() {
        let cache = TtlCache::new(Duration::from_secs(300));
        assert_eq!(cache.state(), CacheState::Empty);
        assert!(cache.get().is_none());

        cache.put(result(window(1)), 0);
        assert_eq!(cache.state(), CacheState::Valid);
        assert!(cache.get().is_some());

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.get().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.state(), CacheState::Stale);
        assert!(cache.get().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_miss() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache.put(result(window(1)), 0);

        cache.invalidate();

        assert_eq!(cache.state(), CacheState::Empty);
        assert!(cache.get().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_for_other_window_misses() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache.put(result(window(1)), 0);

        assert!(cache.get_for(&window(1)).is_some());
        assert!(cache.get_for(&window(2)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_replaces_whole_entry() {
        let cache = TtlCache::new(Duration::from_secs(300));
        let first = cache.put(result(window(1)), 0);
        let second = cache.put(result(window(2)), 0);

        let current = cache.get().unwrap();
        assert!(Arc::ptr_eq(&current, &second));
        assert!(!Arc::ptr_eq(&current, &first));
        assert_eq!(first.meta.range, window(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_after_invalidate_is_discarded() {
        let cache = TtlCache::new(Duration::from_secs(300));
        let started = cache.generation();

        cache.invalidate();
        let returned = cache.put(result(window(1)), started);

        assert_eq!(returned.meta.range, window(1));
        assert_eq!(cache.state(), CacheState::Empty);
        assert!(cache.get().is_none());

        cache.put(result(window(1)), cache.generation());
        assert_eq!(cache.state(), CacheState::Valid);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_since_ignores_older_generations() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache.put(result(window(1)), 0);

        assert!(cache.get_since(&window(1), 0).is_some());
        assert!(cache.get_since(&window(1), 1).is_none());
    }
}
