//! Time-based in-memory caching.
//!
//! Each cache owns its entry and reads time through an injected [`Clock`], so
//! expiry can be driven deterministically in tests. Caches live per process;
//! nothing here is shared across server instances.

use std::sync::Arc;
#[cfg(test)]
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A cached value and the instant it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

struct Slot<T> {
    entry: Option<CacheEntry<T>>,
    generation: u64,
}

/// Single-slot cache invalidated after `ttl` or by an explicit [`TtlCache::invalidate`].
///
/// Every invalidation bumps a generation counter. A fill computed from a read
/// that started before an invalidation is discarded by [`TtlCache::put_if_current`].
pub struct TtlCache<T> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slot: RwLock<Slot<T>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            slot: RwLock::new(Slot {
                entry: None,
                generation: 0,
            }),
        }
    }

    /// Return a copy of the cached value if it is younger than the TTL.
    pub async fn get(&self) -> Option<T> {
        let slot = self.slot.read().await;
        let entry = slot.entry.as_ref()?;
        let age = self.clock.now().signed_duration_since(entry.timestamp);
        match age.to_std() {
            Ok(age) if age < self.ttl => Some(entry.data.clone()),
            // Negative age means the clock went backwards; treat as stale.
            _ => None,
        }
    }

    /// Current generation; capture it before reading the value to be cached.
    pub async fn generation(&self) -> u64 {
        self.slot.read().await.generation
    }

    /// Store `data` unless the cache was invalidated since `generation` was taken.
    /// Returns whether the value was stored.
    pub async fn put_if_current(&self, data: T, generation: u64) -> bool {
        let timestamp = self.clock.now();
        let mut slot = self.slot.write().await;
        if slot.generation != generation {
            return false;
        }
        slot.entry = Some(CacheEntry { data, timestamp });
        true
    }

    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        ))
    }

    #[tokio::test]
    async fn test_empty_cache_misses() {
        let cache: TtlCache<Vec<u32>> = TtlCache::new(Duration::from_secs(60), clock());
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let clock = clock();
        let cache = TtlCache::new(Duration::from_secs(60), clock.clone());
        assert!(cache.put_if_current(vec![1, 2, 3], 0).await);

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get().await, Some(vec![1, 2, 3]));

        clock.advance(Duration::from_secs(1));
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_clears_entry() {
        let cache = TtlCache::new(Duration::from_secs(60), clock());
        assert!(cache.put_if_current("companies".to_string(), 0).await);
        cache.invalidate().await;
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_fill_from_before_invalidate_is_dropped() {
        let cache = TtlCache::new(Duration::from_secs(60), clock());

        let generation = cache.generation().await;
        cache.invalidate().await;
        assert!(!cache.put_if_current(vec![1], generation).await);
        assert!(cache.get().await.is_none());

        let generation = cache.generation().await;
        assert!(cache.put_if_current(vec![2], generation).await);
        assert_eq!(cache.get().await, Some(vec![2]));
    }
}
