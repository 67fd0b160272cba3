use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Result of a cache probe. A stale entry is still returned so callers can
/// fall back to it when the upstream is rate limiting.
#[derive(Debug)]
pub enum CacheLookup<V> {
    Fresh(V),
    Stale(V),
    Miss,
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// Time-boxed read-through cache shared by the gateway endpoints. Entries are
/// fresh within the TTL window and stale afterwards; stale entries are never
/// evicted. The read-check-fetch-populate sequence is not single-flighted:
/// two concurrent misses on one key may both hit the upstream, and the last
/// writer's result overwrites the entry.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn lookup(&self, key: &K) -> CacheLookup<V> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl => {
                CacheLookup::Fresh(entry.value.clone())
            }
            Some(entry) => CacheLookup::Stale(entry.value.clone()),
            None => CacheLookup::Miss,
        }
    }

    pub async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }
}
