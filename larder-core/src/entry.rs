//! Cache envelopes: the unit of storage.
//!
//! The engine never stores a bare payload. Values are wrapped in a
//! [`CacheEntry`] carrying the write timestamp, which is what freshness
//! classification runs against. Fetch failures are optionally persisted as
//! an [`ErrorEnvelope`] under a sibling key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Compute the wall-clock age of a timestamp.
///
/// Clock skew that puts `written_at` in the future reads as zero age rather
/// than an underflow.
pub fn age_since(written_at: DateTime<Utc>) -> Duration {
    Utc::now()
        .signed_duration_since(written_at)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// A cached payload together with the time it was written.
///
/// `written_at` is stamped at construction, so successive writes for the
/// same key from one fetch chain carry non-decreasing timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// The cached payload, opaque to the engine.
    pub data: V,
    /// Wall-clock time the entry was stored.
    pub written_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    /// Wrap a payload with the current timestamp.
    pub fn new(data: V) -> Self {
        Self {
            data,
            written_at: Utc::now(),
        }
    }

    /// Wrap a payload with an explicit timestamp.
    pub fn written_at(data: V, written_at: DateTime<Utc>) -> Self {
        Self { data, written_at }
    }

    /// How long ago this entry was written.
    pub fn age(&self) -> Duration {
        age_since(self.written_at)
    }
}

/// A persisted record of a failed fetch.
///
/// Stored under the `:error` sibling key when error caching is enabled, and
/// replayed instead of re-invoking the loader while it is within its TTL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The upstream failure message.
    pub message: String,
    /// Wall-clock time the failure was recorded.
    pub written_at: DateTime<Utc>,
}

impl ErrorEnvelope {
    /// Record a failure message with the current timestamp.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            written_at: Utc::now(),
        }
    }

    /// How long ago this failure was recorded.
    pub fn age(&self) -> Duration {
        age_since(self.written_at)
    }
}
