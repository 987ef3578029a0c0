//! Larder Cache - Read-Through Caching with Stale-While-Revalidate
//!
//! This crate fronts expensive or rate-limited upstream calls with a cache
//! that serves stale data while refreshing it in the background.
//!
//! # Design
//!
//! Two layers cooperate:
//!
//! 1. **Store adapters** ([`store`]) - keyed byte storage with per-entry
//!    expiry, either an in-process map or a shared Redis server. Selection
//!    is by configuration; the engine treats both identically.
//! 2. **Read-through engine** ([`SwrCache`]) - key derivation, envelope
//!    encoding, freshness classification, single-flight revalidation, and
//!    optional error caching on top of whichever store is configured.
//!
//! # Example
//!
//! ```ignore
//! use larder_cache::{CacheConfig, Loader, StoreConfig, SwrCache};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let store = larder_cache::connect(StoreConfig::Memory {
//!     namespace: "profiles".into(),
//! })
//! .await?;
//!
//! let cache: SwrCache<String, Profile> = SwrCache::new(
//!     Arc::new(ProfileLoader::new(client)),
//!     store,
//!     CacheConfig::new()
//!         .with_ttl(Duration::from_secs(300))
//!         .with_swr(Duration::from_secs(600))
//!         .with_error_caching(true),
//! );
//!
//! let profile = cache.get(&"user:42".to_string()).await?;
//! ```

mod flight;
pub mod read_through;
pub mod store;

pub use read_through::{CacheValue, Loader, SwrCache};
pub use store::{
    connect, MemoryStore, RedisStore, RedisStoreConfig, StoreBackend, StoreConfig, StoreStats,
};

// Re-export the core vocabulary so callers depend on one crate.
pub use larder_core::{
    age_since, error_key, structural_key, CacheConfig, CacheEntry, CacheError, CacheInput,
    CacheResult, ErrorEnvelope, Freshness, Keyspace, LoadError,
};
