//! Error types for cache operations.
//!
//! Every variant is clonable so that a single failure can be fanned out to
//! all callers awaiting the same in-flight revalidation.

use thiserror::Error;

/// Errors surfaced by the cache engine and the backing store adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The backing store could not be reached or returned a transport error.
    #[error("Backing store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// An envelope could not be encoded or decoded.
    #[error("Envelope serialization failed for {key}: {reason}")]
    Serialization { key: String, reason: String },

    /// The upstream loader rejected. Also produced when a cached error
    /// envelope is replayed within its TTL window.
    #[error("Upstream load failed for {key}: {reason}")]
    Upstream { key: String, reason: String },

    /// An in-flight revalidation was dropped before it settled.
    #[error("Revalidation for {key} aborted before settling")]
    RevalidationAborted { key: String },
}

/// Failure type returned by loader implementations.
///
/// Loaders reduce their domain failures to a message; the engine wraps it
/// into [`CacheError::Upstream`] together with the cache key, and the same
/// message is what gets persisted in an error envelope when error caching
/// is enabled.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct LoadError {
    /// Human-readable description of the upstream failure.
    pub message: String,
}

impl LoadError {
    /// Create a new load error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for LoadError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for LoadError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Convenience Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
