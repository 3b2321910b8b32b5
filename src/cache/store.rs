//! Fetch-result storage with TTL expiry and explicit invalidation.

use std::sync::RwLock;
use std::time::Instant;

use lru::LruCache;
use metrics::counter;

use crate::application::posts::FetchOutcome;
use crate::domain::ids::PageId;

use super::config::CacheConfig;
use super::lock::{CacheOp, read_entries, write_entries};

pub(crate) const METRIC_CACHE_HIT: &str = "notion_feed_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "notion_feed_cache_miss_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "notion_feed_cache_evict_total";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub target: PageId,
    pub include_pages: bool,
}

impl CacheKey {
    pub fn new(target: PageId, include_pages: bool) -> Self {
        Self {
            target,
            include_pages,
        }
    }
}

struct Entry {
    outcome: FetchOutcome,
    stored_at: Instant,
}

pub struct PostsCache {
    config: CacheConfig,
    entries: RwLock<LruCache<CacheKey, Entry>>,
}

impl PostsCache {
    pub fn new(config: CacheConfig) -> Self {
        let entries = RwLock::new(LruCache::new(config.capacity_non_zero()));
        Self { config, entries }
    }

    /// Fresh entry for `key`; stale entries are dropped and reported as misses.
    pub fn get(&self, key: &CacheKey) -> Option<FetchOutcome> {
        self.get_at(key, Instant::now())
    }

    pub(crate) fn get_at(&self, key: &CacheKey, now: Instant) -> Option<FetchOutcome> {
        if !self.config.enabled {
            return None;
        }

        let mut entries = write_entries(&self.entries, CacheOp::Get);
        let fresh = match entries.get(key) {
            Some(entry) => now.saturating_duration_since(entry.stored_at) < self.config.ttl,
            None => {
                counter!(METRIC_CACHE_MISS).increment(1);
                return None;
            }
        };

        if !fresh {
            entries.pop(key);
            counter!(METRIC_CACHE_MISS).increment(1);
            return None;
        }

        counter!(METRIC_CACHE_HIT).increment(1);
        entries.get(key).map(|entry| entry.outcome.clone())
    }

    pub fn put(&self, key: CacheKey, outcome: FetchOutcome) {
        self.put_at(key, outcome, Instant::now());
    }

    pub(crate) fn put_at(&self, key: CacheKey, outcome: FetchOutcome, now: Instant) {
        if !self.config.enabled {
            return;
        }

        let entry = Entry {
            outcome,
            stored_at: now,
        };
        let evicted = write_entries(&self.entries, CacheOp::Put).push(key.clone(), entry);
        if evicted.is_some_and(|(evicted_key, _)| evicted_key != key) {
            counter!(METRIC_CACHE_EVICT).increment(1);
        }
    }

    /// Drop both inclusion modes cached for `target`.
    pub fn invalidate(&self, target: &PageId) {
        let mut entries = write_entries(&self.entries, CacheOp::Invalidate);
        for include_pages in [false, true] {
            entries.pop(&CacheKey::new(target.clone(), include_pages));
        }
    }

    pub fn invalidate_all(&self) {
        write_entries(&self.entries, CacheOp::InvalidateAll).clear();
    }

    pub fn len(&self) -> usize {
        read_entries(&self.entries, CacheOp::Len).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::time::Duration;

    use super::*;
    use crate::domain::posts::PostRecord;

    fn target(suffix: char) -> PageId {
        PageId::parse(&format!("0b4c5d1e2f3a4b5c8d6e7f8091a2b3c{suffix}")).expect("page id")
    }

    fn outcome(id: &str) -> FetchOutcome {
        FetchOutcome::Posts(vec![PostRecord {
            id: id.to_string(),
            fields: BTreeMap::new(),
            full_width: false,
            date: 0,
        }])
    }

    fn cache(ttl: Duration, capacity: usize) -> PostsCache {
        PostsCache::new(CacheConfig {
            enabled: true,
            ttl,
            capacity,
        })
    }

    #[test]
    fn fresh_entries_are_served() {
        let cache = cache(Duration::from_secs(60), 4);
        let key = CacheKey::new(target('1'), false);
        let start = Instant::now();

        cache.put_at(key.clone(), outcome("a"), start);
        assert_eq!(
            cache.get_at(&key, start + Duration::from_secs(59)),
            Some(outcome("a"))
        );
    }

    #[test]
    fn stale_entries_expire() {
        let cache = cache(Duration::from_secs(60), 4);
        let key = CacheKey::new(target('1'), false);
        let start = Instant::now();

        cache.put_at(key.clone(), outcome("a"), start);
        assert_eq!(cache.get_at(&key, start + Duration::from_secs(60)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn include_pages_is_part_of_the_key() {
        let cache = cache(Duration::from_secs(60), 4);
        let posts = CacheKey::new(target('1'), false);
        let pages = CacheKey::new(target('1'), true);

        cache.put(posts.clone(), outcome("posts"));
        assert_eq!(cache.get(&pages), None);
        assert_eq!(cache.get(&posts), Some(outcome("posts")));
    }

    #[test]
    fn invalidate_drops_both_modes_of_one_target() {
        let cache = cache(Duration::from_secs(60), 4);
        cache.put(CacheKey::new(target('1'), false), outcome("a"));
        cache.put(CacheKey::new(target('1'), true), outcome("b"));
        cache.put(CacheKey::new(target('2'), false), outcome("c"));

        cache.invalidate(&target('1'));
        assert_eq!(cache.len(), 1);

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_least_recent() {
        let cache = cache(Duration::from_secs(60), 1);
        let first = CacheKey::new(target('1'), false);
        let second = CacheKey::new(target('2'), false);

        cache.put(first.clone(), outcome("a"));
        cache.put(second.clone(), outcome("b"));

        assert_eq!(cache.get(&first), None);
        assert_eq!(cache.get(&second), Some(outcome("b")));
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let cache = PostsCache::new(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        });
        let key = CacheKey::new(target('1'), false);

        cache.put(key.clone(), outcome("a"));
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key), None);
    }

    fn poison(cache: &PostsCache) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache.entries.write().expect("lock");
            panic!("poison the lock");
        }));
        assert!(cache.entries.is_poisoned());
    }

    #[test]
    fn poisoned_lock_drops_cached_results() {
        let cache = cache(Duration::from_secs(60), 4);
        let key = CacheKey::new(target('1'), false);
        cache.put(key.clone(), outcome("a"));

        poison(&cache);

        assert_eq!(cache.get(&key), None);
        assert!(!cache.entries.is_poisoned());

        cache.put(key.clone(), outcome("b"));
        assert_eq!(cache.get(&key), Some(outcome("b")));
    }

    #[test]
    fn poisoned_lock_reads_as_empty() {
        let cache = cache(Duration::from_secs(60), 4);
        cache.put(CacheKey::new(target('1'), false), outcome("a"));

        poison(&cache);

        assert!(cache.is_empty());
        assert!(!cache.entries.is_poisoned());
    }
}
