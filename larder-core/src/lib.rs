//! Larder Core - Envelope, Freshness, and Key Types
//!
//! Pure data structures and policy with no I/O. The store adapters and the
//! read-through engine live in `larder-cache`; this crate is the shared
//! vocabulary between them: cache envelopes, freshness classification,
//! key derivation, configuration, and the error taxonomy.

pub mod config;
pub mod entry;
pub mod error;
pub mod freshness;
pub mod key;

pub use config::{CacheConfig, DEFAULT_TTL, MIN_ERROR_TTL};
pub use entry::{age_since, CacheEntry, ErrorEnvelope};
pub use error::{CacheError, CacheResult, LoadError};
pub use freshness::Freshness;
pub use key::{error_key, structural_key, CacheInput, Keyspace};
