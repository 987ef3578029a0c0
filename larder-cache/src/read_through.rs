//! Read-through cache engine with stale-while-revalidate.
//!
//! The engine fronts an expensive or rate-limited loader with a backing
//! store. Every read classifies the stored envelope's age and routes
//! accordingly: fresh entries are served as-is, stale-but-servable entries
//! are served immediately while a background refresh runs, and expired
//! entries (or misses) block on a synchronous fetch.
//!
//! Every fetch path, including the background one, goes through a single
//! per-engine flight map, so concurrent demand for one key costs at most
//! one upstream call per process.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use larder_core::{
    error_key, CacheConfig, CacheEntry, CacheError, CacheInput, CacheResult, ErrorEnvelope,
    Freshness, Keyspace, LoadError,
};

use crate::flight::{Flight, FlightMap};
use crate::store::{MemoryStore, StoreBackend};

/// The loader invoked on a miss or a forced refresh.
///
/// Implementations own their timeout and cancellation policy; the engine
/// imposes neither. A loader failure on the synchronous path propagates to
/// the caller, and on the background path is swallowed after logging.
#[async_trait]
pub trait Loader<I, V>: Send + Sync {
    /// Fetch the value for a logical input from the upstream source.
    async fn load(&self, input: &I) -> Result<V, LoadError>;
}

/// Marker for payload types the engine can cache.
///
/// Blanket-implemented: any clonable, serializable, thread-safe type
/// qualifies.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Read-through cache with stale-while-revalidate semantics.
///
/// # Example
///
/// ```ignore
/// use larder_cache::{CacheConfig, Loader, SwrCache};
/// use std::time::Duration;
///
/// let cache: SwrCache<String, Profile> = SwrCache::in_memory(
///     "profiles",
///     Arc::new(ProfileLoader::new(client)),
///     CacheConfig::new()
///         .with_ttl(Duration::from_secs(300))
///         .with_swr(Duration::from_secs(600)),
/// );
///
/// // Fresh entries return without touching the upstream; stale ones are
/// // served immediately while a refresh runs behind the caller's back.
/// let profile = cache.get(&"user:42".to_string()).await?;
/// ```
pub struct SwrCache<I, V> {
    /// The upstream loader.
    loader: Arc<dyn Loader<I, V>>,
    /// The backing store adapter.
    store: Arc<dyn StoreBackend>,
    /// Freshness and error-caching policy.
    config: CacheConfig,
    /// In-flight revalidations, keyed by cache key. Instance state: two
    /// engines never share de-duplication, even over one physical store.
    flights: Arc<FlightMap<V>>,
    _marker: PhantomData<fn(I) -> V>,
}

impl<I, V> SwrCache<I, V>
where
    I: CacheInput + Clone + Send + Sync + 'static,
    V: CacheValue,
{
    /// Create an engine over the given loader and store.
    pub fn new(
        loader: Arc<dyn Loader<I, V>>,
        store: Arc<dyn StoreBackend>,
        config: CacheConfig,
    ) -> Self {
        Self {
            loader,
            store,
            config,
            flights: Arc::new(FlightMap::new()),
            _marker: PhantomData,
        }
    }

    /// Create an engine with default configuration.
    pub fn with_defaults(loader: Arc<dyn Loader<I, V>>, store: Arc<dyn StoreBackend>) -> Self {
        Self::new(loader, store, CacheConfig::default())
    }

    /// Create an engine over a fresh in-process store.
    pub fn in_memory(
        namespace: impl Into<String>,
        loader: Arc<dyn Loader<I, V>>,
        config: CacheConfig,
    ) -> Self {
        let store = Arc::new(MemoryStore::new(Keyspace::new(namespace)));
        Self::new(loader, store, config)
    }

    /// The engine's configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The backing store adapter.
    pub fn store(&self) -> &Arc<dyn StoreBackend> {
        &self.store
    }

    /// Get the value for an input, fetching through the loader as needed.
    ///
    /// Fresh hits return without upstream activity. Stale-but-servable hits
    /// return the cached value immediately and refresh in the background.
    /// Expired entries and misses block on the loader, and a store read
    /// failure falls back to a direct load rather than failing the caller.
    ///
    /// # Errors
    ///
    /// Propagates loader failures on the synchronous path, or replays a
    /// cached error envelope when error caching is enabled and the envelope
    /// is still within its TTL.
    pub async fn get(&self, input: &I) -> CacheResult<V> {
        let key = input.cache_key();

        match self.store.get(&key).await {
            Ok(Some(bytes)) => match self.decode_entry(&key, &bytes) {
                Some(entry) => match self.config.classify(entry.age()) {
                    Freshness::Fresh => Ok(entry.data),
                    Freshness::StaleServable => {
                        self.spawn_revalidation(&key, input);
                        Ok(entry.data)
                    }
                    Freshness::Expired => self.revalidate(&key, input).await,
                },
                None => self.revalidate(&key, input).await,
            },
            Ok(None) => self.revalidate(&key, input).await,
            Err(err) => {
                warn!(key = %key, error = %err, "store read failed, falling back to direct load");
                self.revalidate(&key, input).await
            }
        }
    }

    /// Write a fresh entry for an input, bypassing the loader.
    ///
    /// `ttl` overrides the configured freshness window for this entry's
    /// physical expiry. Used for cache warming and write-through patterns.
    pub async fn set(&self, input: &I, value: V, ttl: Option<Duration>) -> CacheResult<()> {
        let key = input.cache_key();
        let entry = CacheEntry::new(value);
        let bytes = encode_entry(&key, &entry)?;
        self.store
            .set(&key, bytes, self.config.physical_ttl(ttl))
            .await
    }

    /// Remove an input's entry and any cached error envelope for it.
    pub async fn delete(&self, input: &I) -> CacheResult<()> {
        let key = input.cache_key();
        self.store.delete(&key).await?;
        self.store.delete(&error_key(&key)).await
    }

    /// Alias of [`delete`](SwrCache::delete), for call sites that read as
    /// "force a refetch next time" rather than "remove this data".
    pub async fn invalidate(&self, input: &I) -> CacheResult<()> {
        self.delete(input).await
    }

    /// Remove every entry in this engine's namespace.
    pub async fn clear(&self) -> CacheResult<()> {
        self.store.clear().await
    }

    /// Whether an entry exists for the input, regardless of freshness.
    ///
    /// A logically stale entry the store has not yet evicted counts as
    /// present.
    pub async fn has(&self, input: &I) -> CacheResult<bool> {
        self.store.has(&input.cache_key()).await
    }

    /// Get every input concurrently.
    ///
    /// Never fails as a whole: an input whose lookup failed yields `None`
    /// at its position.
    pub async fn get_many(&self, inputs: &[I]) -> Vec<Option<V>> {
        join_all(inputs.iter().map(|input| self.get(input)))
            .await
            .into_iter()
            .map(Result::ok)
            .collect()
    }

    /// Set every entry concurrently.
    ///
    /// All writes run; once they have settled, the first failure in input
    /// order is surfaced.
    pub async fn set_many(&self, entries: Vec<(I, V)>) -> CacheResult<()> {
        join_all(
            entries
                .iter()
                .map(|(input, value)| self.set(input, value.clone(), None)),
        )
        .await
        .into_iter()
        .collect()
    }

    /// Delete every input concurrently.
    ///
    /// All deletions run; once they have settled, the first failure in
    /// input order is surfaced.
    pub async fn delete_many(&self, inputs: &[I]) -> CacheResult<()> {
        join_all(inputs.iter().map(|input| self.delete(input)))
            .await
            .into_iter()
            .collect()
    }

    /// Refresh a key through the flight map, leading or following.
    async fn revalidate(&self, key: &str, input: &I) -> CacheResult<V> {
        match self.flights.join(key) {
            Flight::Lead(guard) => {
                let result = self.load_and_store(key, input).await;
                guard.settle(result.clone());
                result
            }
            Flight::Follow(mut rx) => match rx.recv().await {
                Ok(result) => result,
                Err(_) => Err(CacheError::RevalidationAborted {
                    key: key.to_string(),
                }),
            },
        }
    }

    /// Run the loader for a key and persist the outcome.
    ///
    /// With error caching enabled, a live error envelope is replayed before
    /// the loader is consulted, a new failure is persisted under the error
    /// key, and a success discards any stale envelope.
    async fn load_and_store(&self, key: &str, input: &I) -> CacheResult<V> {
        if self.config.cache_errors {
            if let Some(replayed) = self.cached_error(key).await {
                return Err(replayed);
            }
        }

        match self.loader.load(input).await {
            Ok(value) => {
                let entry = CacheEntry::new(value.clone());
                self.persist_entry(key, &entry).await;
                if self.config.cache_errors {
                    self.discard_error(key).await;
                }
                Ok(value)
            }
            Err(load_err) => {
                if self.config.cache_errors {
                    self.persist_error(key, &load_err).await;
                }
                Err(CacheError::Upstream {
                    key: key.to_string(),
                    reason: load_err.message,
                })
            }
        }
    }

    /// Kick off a background refresh unless one is already in flight.
    ///
    /// The caller has already been served stale data; whatever happens to
    /// the refresh must not reach them. Failures are logged and dropped.
    fn spawn_revalidation(&self, key: &str, input: &I) {
        let Some(guard) = self.flights.try_lead(key) else {
            return;
        };

        let engine = self.clone();
        let key = key.to_string();
        let input = input.clone();
        tokio::spawn(async move {
            let result = engine.load_and_store(&key, &input).await;
            if let Err(err) = &result {
                warn!(key = %key, error = %err, "background revalidation failed");
            }
            guard.settle(result);
        });
    }

    /// Read the error envelope for a key, if one is live.
    ///
    /// Best-effort: a store failure or corrupt envelope reads as "no
    /// envelope" so the caller proceeds to a direct load.
    async fn cached_error(&self, key: &str) -> Option<CacheError> {
        let bytes = self.store.get(&error_key(key)).await.ok().flatten()?;
        let envelope: ErrorEnvelope = serde_json::from_slice(&bytes).ok()?;
        if envelope.age() <= self.config.effective_error_ttl() {
            Some(CacheError::Upstream {
                key: key.to_string(),
                reason: envelope.message,
            })
        } else {
            None
        }
    }

    /// Persist a fetched entry, best-effort.
    ///
    /// The value is already in hand; a store write failure must not turn a
    /// successful load into a caller-visible error.
    async fn persist_entry(&self, key: &str, entry: &CacheEntry<V>) {
        let bytes = match encode_entry(key, entry) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key = %key, error = %err, "failed to encode entry");
                return;
            }
        };
        if let Err(err) = self
            .store
            .set(key, bytes, self.config.physical_ttl(None))
            .await
        {
            warn!(key = %key, error = %err, "failed to persist entry");
        }
    }

    /// Persist an error envelope, best-effort.
    async fn persist_error(&self, key: &str, load_err: &LoadError) {
        let envelope = ErrorEnvelope::new(load_err.message.clone());
        let bytes = match serde_json::to_vec(&envelope) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key = %key, error = %err, "failed to encode error envelope");
                return;
            }
        };
        if let Err(err) = self
            .store
            .set(&error_key(key), bytes, self.config.effective_error_ttl())
            .await
        {
            warn!(key = %key, error = %err, "failed to persist error envelope");
        }
    }

    /// Drop a stale error envelope after a successful load, best-effort.
    async fn discard_error(&self, key: &str) {
        if let Err(err) = self.store.delete(&error_key(key)).await {
            warn!(key = %key, error = %err, "failed to discard error envelope");
        }
    }

    /// Decode a stored envelope, treating corruption as a miss.
    fn decode_entry(&self, key: &str, bytes: &[u8]) -> Option<CacheEntry<V>> {
        match serde_json::from_slice(bytes) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(key = %key, error = %err, "stored envelope is corrupt, treating as miss");
                None
            }
        }
    }
}

fn encode_entry<V: Serialize>(key: &str, entry: &CacheEntry<V>) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(entry).map_err(|e| CacheError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

impl<I, V> Clone for SwrCache<I, V> {
    fn clone(&self) -> Self {
        Self {
            loader: Arc::clone(&self.loader),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            flights: Arc::clone(&self.flights),
            _marker: PhantomData,
        }
    }
}
