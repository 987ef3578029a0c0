//! Backing store contract.
//!
//! Adapters provide keyed byte storage with per-entry expiry. Envelope
//! encoding stays in the engine; an adapter never inspects the bytes it
//! holds. Both variants (process-local and shared remote) implement the
//! same trait so the engine treats them identically.

use async_trait::async_trait;
use std::time::Duration;

use larder_core::CacheResult;

/// Keyed byte storage with per-entry expiry and a namespace-scoped clear.
///
/// # Contract
///
/// - `get` returns `Ok(None)` for a missing key and reserves errors for
///   transport or connectivity failures. A failing store must never read as
///   a silent miss.
/// - `set` makes the entry retrievable immediately; after `ttl` elapses the
///   store may evict it, with best-effort timing.
/// - `delete` is idempotent. Deleting an absent key is not an error.
/// - `clear` removes every entry in the adapter's configured namespace and
///   nothing else, even when other namespaces share the physical store.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Fetch the bytes stored under a logical key.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store bytes under a logical key with the given expiry.
    async fn set(&self, key: &str, bytes: Vec<u8>, ttl: Duration) -> CacheResult<()>;

    /// Remove a logical key.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Remove every entry in this adapter's namespace.
    async fn clear(&self) -> CacheResult<()>;

    /// Whether a logical key is present (not yet physically expired).
    async fn has(&self, key: &str) -> CacheResult<bool>;
}
