//! Cache key derivation and namespace scoping.
//!
//! Logical inputs derive their cache key through [`CacheInput`]; store
//! adapters prefix every physical key with a [`Keyspace`] so that caches
//! sharing one physical store never observe each other's entries.

use serde::Serialize;

use crate::error::{CacheError, CacheResult};

/// Separator between a namespace and the logical key.
const SEPARATOR: char = ':';

/// Suffix under which a key's error envelope is stored.
const ERROR_SUFFIX: &str = ":error";

/// Derive the sibling key holding a logical key's error envelope.
pub fn error_key(key: &str) -> String {
    format!("{key}{ERROR_SUFFIX}")
}

/// A namespace that scopes physical keys within a shared store.
///
/// Adapters are constructed with a `Keyspace` and run every key through
/// [`physical`](Keyspace::physical) before touching storage. A
/// namespace-wide clear removes exactly the keys for which
/// [`contains`](Keyspace::contains) holds, leaving other namespaces in the
/// same physical store untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Keyspace {
    namespace: String,
}

impl Keyspace {
    /// Create a keyspace for the given namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// The namespace this keyspace scopes to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Map a logical key to its physical form, `<namespace>:<key>`.
    pub fn physical(&self, key: &str) -> String {
        format!("{}{}{}", self.namespace, SEPARATOR, key)
    }

    /// Whether a physical key belongs to this keyspace.
    pub fn contains(&self, physical: &str) -> bool {
        let ns = self.namespace.as_bytes();
        let key = physical.as_bytes();
        key.len() > ns.len() && key[ns.len()] == SEPARATOR as u8 && key.starts_with(ns)
    }

    /// The pattern matching every physical key in this keyspace.
    ///
    /// Usable as a Redis `KEYS`/`SCAN` glob.
    pub fn match_pattern(&self) -> String {
        format!("{}{}*", self.namespace, SEPARATOR)
    }
}

/// A logical input that knows its own cache key.
///
/// Derivation must be deterministic, and injective enough that distinct
/// inputs do not collide. Textual and integer inputs use themselves
/// verbatim; structured inputs should implement this trait with an
/// explicitly ordered rendering (see [`structural_key`] for the caveat).
pub trait CacheInput: Send + Sync {
    /// Derive the cache key for this input.
    fn cache_key(&self) -> String;
}

impl CacheInput for String {
    fn cache_key(&self) -> String {
        self.clone()
    }
}

impl CacheInput for &str {
    fn cache_key(&self) -> String {
        (*self).to_string()
    }
}

impl CacheInput for u32 {
    fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl CacheInput for u64 {
    fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl CacheInput for i64 {
    fn cache_key(&self) -> String {
        self.to_string()
    }
}

/// Derive a key from a structured input by serializing it.
///
/// Suitable for simple flat shapes only: field order follows the struct
/// definition, so two types (or two versions of one type) with reordered
/// fields derive different keys for the same logical input. Anything
/// order-sensitive should implement [`CacheInput`] with an explicit
/// rendering instead.
pub fn structural_key<T: Serialize>(input: &T) -> CacheResult<String> {
    serde_json::to_string(input).map_err(|e| CacheError::Serialization {
        key: "<structural input>".to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_key_is_prefixed() {
        let ks = Keyspace::new("users");
        assert_eq!(ks.physical("42"), "users:42");
    }

    #[test]
    fn test_contains_own_keys_only() {
        let users = Keyspace::new("users");
        let user_settings = Keyspace::new("users-settings");

        assert!(users.contains("users:42"));
        assert!(users.contains("users:42:error"));
        assert!(!users.contains("users-settings:42"));
        assert!(!user_settings.contains("users:42"));
        assert!(!users.contains("users"));
    }

    #[test]
    fn test_match_pattern() {
        let ks = Keyspace::new("lookups");
        assert_eq!(ks.match_pattern(), "lookups:*");
    }

    #[test]
    fn test_error_key_suffix() {
        assert_eq!(error_key("users:42"), "users:42:error");
    }

    #[test]
    fn test_textual_inputs_are_identity() {
        assert_eq!("abc".cache_key(), "abc");
        assert_eq!("abc".to_string().cache_key(), "abc");
        assert_eq!(42u64.cache_key(), "42");
    }

    #[test]
    fn test_structural_key_is_deterministic() {
        #[derive(Serialize)]
        struct Lookup {
            org: String,
            id: u64,
        }
        let a = structural_key(&Lookup {
            org: "acme".to_string(),
            id: 7,
        })
        .unwrap();
        let b = structural_key(&Lookup {
            org: "acme".to_string(),
            id: 7,
        })
        .unwrap();
        assert_eq!(a, b);

        let c = structural_key(&Lookup {
            org: "acme".to_string(),
            id: 8,
        })
        .unwrap();
        assert_ne!(a, c);
    }
}
