//! Lock access for the entry map.
//!
//! A panic while the write guard is held may leave a half-written entry, so a
//! poisoned lock is recovered by dropping every cached result and clearing the
//! poison flag. Callers then see misses and refetch.

use std::hash::Hash;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lru::LruCache;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CacheOp {
    Get,
    Put,
    Invalidate,
    InvalidateAll,
    Len,
}

impl CacheOp {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Invalidate => "invalidate",
            Self::InvalidateAll => "invalidate_all",
            Self::Len => "len",
        }
    }
}

type Entries<K, V> = RwLock<LruCache<K, V>>;

pub(super) fn write_entries<K: Hash + Eq, V>(
    lock: &Entries<K, V>,
    op: CacheOp,
) -> RwLockWriteGuard<'_, LruCache<K, V>> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            let mut guard = poisoned.into_inner();
            let dropped = guard.len();
            guard.clear();
            lock.clear_poison();
            warn!(
                target = "notion_feed::cache",
                op = op.as_str(),
                dropped,
                "Posts cache lock was poisoned; dropped cached results"
            );
            guard
        }
    }
}

pub(super) fn read_entries<K: Hash + Eq, V>(
    lock: &Entries<K, V>,
    op: CacheOp,
) -> RwLockReadGuard<'_, LruCache<K, V>> {
    if lock.is_poisoned() {
        drop(write_entries(lock, op));
    }
    lock.read().unwrap_or_else(PoisonError::into_inner)
}
