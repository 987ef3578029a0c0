//! Shared remote backing store over Redis.
//!
//! The multi-instance variant: entries survive process restarts and are
//! visible to every instance pointed at the same server. Network failures
//! surface as [`CacheError::StoreUnavailable`], never as silent misses.
//!
//! Expiry is delegated to the server via `PSETEX`; the namespace-scoped
//! clear walks the keyspace pattern with `KEYS` and deletes the matches.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};

use larder_core::{CacheError, CacheResult, Keyspace};

use super::traits::StoreBackend;

const DEFAULT_URL: &str = "redis://localhost:6379";
const DEFAULT_NAMESPACE: &str = "larder";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection parameters for the shared store.
///
/// The engine never reads the environment; the application resolves its
/// config sources and hands this struct over. [`from_env`](RedisStoreConfig::from_env)
/// is a convenience for the common layout:
///
/// - `REDIS_URL` - connection URL, may carry credentials and a database
///   index (default `redis://localhost:6379`)
/// - `REDIS_NAMESPACE` - keyspace prefix (default `larder`)
/// - `REDIS_CONNECT_TIMEOUT_SECS` - connection timeout (default 5)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisStoreConfig {
    /// Connection URL, e.g. `redis://:secret@cache.internal:6379/2`.
    pub url: String,
    /// Namespace prefix for every key this adapter touches.
    pub namespace: String,
    /// How long to wait for the initial connection.
    pub connect_timeout: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl RedisStoreConfig {
    /// Create a config for the given URL and namespace.
    pub fn new(url: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Resolve the config from process environment variables.
    pub fn from_env() -> Self {
        let connect_timeout = env::var("REDIS_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT);

        Self {
            url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_URL.to_string()),
            namespace: env::var("REDIS_NAMESPACE").unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string()),
            connect_timeout,
        }
    }
}

/// Redis-backed store adapter.
///
/// Holds a multiplexed connection; each operation clones the handle, which
/// shares the underlying socket.
pub struct RedisStore {
    conn: MultiplexedConnection,
    keyspace: Keyspace,
}

impl RedisStore {
    /// Connect to the configured server.
    pub async fn connect(config: RedisStoreConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.as_str()).map_err(to_store_error)?;

        let conn = tokio::time::timeout(
            config.connect_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| CacheError::StoreUnavailable {
            reason: format!("connection to {} timed out", config.url),
        })?
        .map_err(to_store_error)?;

        Ok(Self {
            conn,
            keyspace: Keyspace::new(config.namespace),
        })
    }

    /// The keyspace this adapter is scoped to.
    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }
}

fn to_store_error(e: redis::RedisError) -> CacheError {
    CacheError::StoreUnavailable {
        reason: e.to_string(),
    }
}

#[async_trait]
impl StoreBackend for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let physical = self.keyspace.physical(key);

        let bytes: Option<Vec<u8>> = conn.get(&physical).await.map_err(to_store_error)?;
        Ok(bytes)
    }

    async fn set(&self, key: &str, bytes: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let physical = self.keyspace.physical(key);

        // PSETEX rejects a zero expiry; clamp to one millisecond.
        let millis = (ttl.as_millis() as u64).max(1);
        let _: () = conn
            .pset_ex(&physical, bytes, millis)
            .await
            .map_err(to_store_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let physical = self.keyspace.physical(key);

        let _: i64 = conn.del(&physical).await.map_err(to_store_error)?;
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut conn = self.conn.clone();

        let keys: Vec<String> = conn
            .keys(self.keyspace.match_pattern())
            .await
            .map_err(to_store_error)?;

        if keys.is_empty() {
            return Ok(());
        }

        let _: i64 = conn.del(&keys).await.map_err(to_store_error)?;
        Ok(())
    }

    async fn has(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let physical = self.keyspace.physical(key);

        let exists: bool = conn.exists(&physical).await.map_err(to_store_error)?;
        Ok(exists)
    }
}
