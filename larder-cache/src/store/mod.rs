//! Backing store adapters.
//!
//! Two variants cover the deployment shapes the engine supports: an
//! in-process map for single-instance setups and a shared Redis store for
//! multi-instance coherence. Both sit behind [`StoreBackend`] and are
//! selected through [`StoreConfig`], so swapping one for the other is a
//! configuration change, not a code change.

pub mod memory;
pub mod redis;
pub mod traits;

pub use memory::{MemoryStore, StoreStats};
pub use redis::{RedisStore, RedisStoreConfig};
pub use traits::StoreBackend;

use std::sync::Arc;

use larder_core::{CacheResult, Keyspace};

/// Which backing store to run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// Process-local map. Zero network latency, lost on restart.
    Memory {
        /// Keyspace prefix for this cache's entries.
        namespace: String,
    },
    /// Shared network store. Survives restarts, coherent across instances,
    /// subject to network failure.
    Remote(RedisStoreConfig),
}

/// Build the configured store adapter.
pub async fn connect(config: StoreConfig) -> CacheResult<Arc<dyn StoreBackend>> {
    match config {
        StoreConfig::Memory { namespace } => {
            Ok(Arc::new(MemoryStore::new(Keyspace::new(namespace))))
        }
        StoreConfig::Remote(remote) => Ok(Arc::new(RedisStore::connect(remote).await?)),
    }
}
