//! Engine configuration.

use std::time::Duration;

use crate::freshness::Freshness;

/// Default freshness window for cached entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Floor for the derived error-envelope TTL.
pub const MIN_ERROR_TTL: Duration = Duration::from_secs(60);

/// Configuration for the read-through cache engine.
///
/// All knobs have defaults; construction is builder-style:
///
/// ```
/// use larder_core::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::new()
///     .with_ttl(Duration::from_secs(300))
///     .with_swr(Duration::from_secs(60))
///     .with_error_caching(true);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Freshness window. Entries younger than this are served without any
    /// revalidation.
    pub ttl: Duration,
    /// Additional window past `ttl` during which a stale entry is still
    /// served immediately while a background refresh runs. `None` or zero
    /// disables stale serving.
    pub swr: Option<Duration>,
    /// Whether fetch failures are cached to suppress repeated failing calls.
    pub cache_errors: bool,
    /// TTL applied to cached error envelopes. When unset, derived as
    /// a tenth of `ttl` with a one-minute floor.
    pub error_ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            swr: None,
            cache_errors: false,
            error_ttl: None,
        }
    }
}

impl CacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the freshness window.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the stale-while-revalidate window.
    pub fn with_swr(mut self, swr: Duration) -> Self {
        self.swr = Some(swr);
        self
    }

    /// Enable or disable error caching.
    pub fn with_error_caching(mut self, enabled: bool) -> Self {
        self.cache_errors = enabled;
        self
    }

    /// Set an explicit error-envelope TTL.
    pub fn with_error_ttl(mut self, ttl: Duration) -> Self {
        self.error_ttl = Some(ttl);
        self
    }

    /// The stale-while-revalidate window, zero when disabled.
    pub fn swr_window(&self) -> Duration {
        self.swr.unwrap_or(Duration::ZERO)
    }

    /// The TTL applied to cached error envelopes.
    pub fn effective_error_ttl(&self) -> Duration {
        self.error_ttl
            .unwrap_or_else(|| (self.ttl / 10).max(MIN_ERROR_TTL))
    }

    /// Classify an entry age against this config's windows.
    pub fn classify(&self, age: Duration) -> Freshness {
        Freshness::classify(age, self.ttl, self.swr)
    }

    /// The expiry handed to the backing store for a primary entry.
    ///
    /// The store must retain an entry through the stale-servable band, so
    /// physical expiry is the freshness window plus the swr window.
    pub fn physical_ttl(&self, override_ttl: Option<Duration>) -> Duration {
        override_ttl
            .unwrap_or(self.ttl)
            .saturating_add(self.swr_window())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert_eq!(config.swr, None);
        assert!(!config.cache_errors);
        assert_eq!(config.error_ttl, None);
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::new()
            .with_ttl(Duration::from_secs(120))
            .with_swr(Duration::from_secs(30))
            .with_error_caching(true)
            .with_error_ttl(Duration::from_secs(5));

        assert_eq!(config.ttl, Duration::from_secs(120));
        assert_eq!(config.swr, Some(Duration::from_secs(30)));
        assert!(config.cache_errors);
        assert_eq!(config.error_ttl, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_error_ttl_derivation_uses_tenth_of_ttl() {
        let config = CacheConfig::new().with_ttl(Duration::from_secs(36_000));
        assert_eq!(config.effective_error_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_error_ttl_derivation_has_one_minute_floor() {
        let config = CacheConfig::new().with_ttl(Duration::from_secs(30));
        assert_eq!(config.effective_error_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_explicit_error_ttl_wins() {
        let config = CacheConfig::new().with_error_ttl(Duration::from_secs(5));
        assert_eq!(config.effective_error_ttl(), Duration::from_secs(5));
    }

    #[test]
    fn test_physical_ttl_spans_swr_window() {
        let config = CacheConfig::new()
            .with_ttl(Duration::from_secs(100))
            .with_swr(Duration::from_secs(25));
        assert_eq!(config.physical_ttl(None), Duration::from_secs(125));
        assert_eq!(
            config.physical_ttl(Some(Duration::from_secs(10))),
            Duration::from_secs(35)
        );
    }

    #[test]
    fn test_classify_delegates_to_windows() {
        let config = CacheConfig::new()
            .with_ttl(Duration::from_millis(1000))
            .with_swr(Duration::from_millis(500));
        assert!(config.classify(Duration::from_millis(900)).is_fresh());
        assert!(config
            .classify(Duration::from_millis(1200))
            .is_stale_servable());
        assert!(config.classify(Duration::from_millis(1600)).is_expired());
    }
}
