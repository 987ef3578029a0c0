//! Process-local backing store.
//!
//! A map behind a lock, scoped to one process lifetime. Zero network
//! latency, lost on restart. Physical expiry is checked on access rather
//! than by a sweeper, so an entry past its TTL reads as absent even if the
//! bytes are still resident.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use larder_core::{CacheResult, Keyspace};

use super::traits::StoreBackend;

/// Hit and miss counters for a memory store view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of reads that found a live entry.
    pub hits: u64,
    /// Number of reads that found nothing, or only an expired entry.
    pub misses: u64,
}

impl StoreStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A stored value with its physical expiry.
#[derive(Debug, Clone)]
struct StoredBytes {
    bytes: Vec<u8>,
    written_at: Instant,
    ttl: Duration,
}

impl StoredBytes {
    fn is_expired(&self) -> bool {
        self.written_at.elapsed() > self.ttl
    }
}

/// In-process map-backed store.
///
/// Keys are physically prefixed with the view's [`Keyspace`]. Several views
/// can share one physical map through [`shared_with`](MemoryStore::shared_with),
/// which is how multiple caches cohabit a single store without observing
/// each other.
pub struct MemoryStore {
    keyspace: Keyspace,
    entries: Arc<RwLock<HashMap<String, StoredBytes>>>,
    stats: Mutex<StoreStats>,
}

impl MemoryStore {
    /// Create a store with its own physical map.
    pub fn new(keyspace: Keyspace) -> Self {
        Self {
            keyspace,
            entries: Arc::new(RwLock::new(HashMap::new())),
            stats: Mutex::new(StoreStats::default()),
        }
    }

    /// Create another view over this store's physical map under a different
    /// keyspace. Statistics are tracked per view.
    pub fn shared_with(&self, keyspace: Keyspace) -> Self {
        Self {
            keyspace,
            entries: Arc::clone(&self.entries),
            stats: Mutex::new(StoreStats::default()),
        }
    }

    /// The keyspace this view is scoped to.
    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Snapshot of this view's hit and miss counters.
    pub fn stats(&self) -> StoreStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record_hit(&self) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .hits += 1;
    }

    fn record_miss(&self) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .misses += 1;
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let physical = self.keyspace.physical(key);
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match entries.get(&physical) {
            Some(stored) if stored.is_expired() => {
                entries.remove(&physical);
                self.record_miss();
                Ok(None)
            }
            Some(stored) => {
                let bytes = stored.bytes.clone();
                self.record_hit();
                Ok(Some(bytes))
            }
            None => {
                self.record_miss();
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, bytes: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let physical = self.keyspace.physical(key);
        let stored = StoredBytes {
            bytes,
            written_at: Instant::now(),
            ttl,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(physical, stored);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let physical = self.keyspace.physical(key);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&physical);
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|physical, _| !self.keyspace.contains(physical));
        Ok(())
    }

    async fn has(&self, key: &str) -> CacheResult<bool> {
        let physical = self.keyspace.physical(key);
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .get(&physical)
            .map(|stored| !stored.is_expired())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(namespace: &str) -> MemoryStore {
        MemoryStore::new(Keyspace::new(namespace))
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = store("t");
        store
            .set("k", b"payload".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"payload".to_vec()));
        assert!(store.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_key_is_none_not_error() {
        let store = store("t");
        assert_eq!(store.get("absent").await.unwrap(), None);
        assert!(!store.has("absent").await.unwrap());
    }

    #[tokio::test]
    async fn test_expiry_reads_as_absent() {
        let store = store("t");
        store
            .set("k", b"v".to_vec(), Duration::from_millis(30))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = store("t");
        store
            .set("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_scopes_to_own_namespace() {
        let a = store("a");
        let b = a.shared_with(Keyspace::new("b"));

        a.set("k", b"va".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        b.set("k", b"vb".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        a.clear().await.unwrap();

        assert_eq!(a.get("k").await.unwrap(), None);
        assert_eq!(b.get("k").await.unwrap(), Some(b"vb".to_vec()));
    }

    #[tokio::test]
    async fn test_shared_views_do_not_collide_on_same_logical_key() {
        let a = store("a");
        let b = a.shared_with(Keyspace::new("b"));

        a.set("k", b"va".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(b.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stats_track_hits_and_misses() {
        let store = store("t");
        store
            .set("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        store.get("k").await.unwrap();
        store.get("absent").await.unwrap();

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 0.001);
    }
}
