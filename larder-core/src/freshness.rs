//! Freshness classification for cached entries.
//!
//! An entry's age places it in one of three bands relative to the configured
//! freshness window and the optional stale-while-revalidate extension. The
//! engine routes each `get` based on this classification alone.

use std::time::Duration;

/// Where an entry's age falls relative to the configured windows.
///
/// Per key, an entry cycles through these bands as time passes:
///
/// ```text
/// Fresh ── age > ttl ──▶ StaleServable (swr enabled) or Expired
/// StaleServable ── age > ttl + swr ──▶ Expired
/// ```
///
/// A successful refetch resets the cycle by writing a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Age is within the freshness window. Served as-is, no revalidation.
    Fresh,
    /// Age is past the freshness window but within the stale-while-revalidate
    /// extension. Served immediately while a background refresh runs.
    StaleServable,
    /// Age is beyond every serving window. A synchronous refetch is required
    /// before anything can be returned.
    Expired,
}

impl Freshness {
    /// Classify an entry age against a freshness window and an optional
    /// stale-while-revalidate extension.
    ///
    /// A `swr` of `None` or zero disables the stale-servable band entirely,
    /// so anything past `ttl` classifies as expired.
    pub fn classify(age: Duration, ttl: Duration, swr: Option<Duration>) -> Self {
        if age <= ttl {
            return Self::Fresh;
        }
        match swr {
            Some(swr) if !swr.is_zero() && age <= ttl.saturating_add(swr) => Self::StaleServable,
            _ => Self::Expired,
        }
    }

    /// Returns true if this is the fresh band.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }

    /// Returns true if this is the stale-but-servable band.
    pub fn is_stale_servable(&self) -> bool {
        matches!(self, Self::StaleServable)
    }

    /// Returns true if this is the expired band.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TTL: Duration = Duration::from_millis(1000);
    const SWR: Duration = Duration::from_millis(500);

    #[test]
    fn test_fresh_within_ttl() {
        let f = Freshness::classify(Duration::from_millis(999), TTL, Some(SWR));
        assert!(f.is_fresh());
    }

    #[test]
    fn test_fresh_boundary_is_inclusive() {
        let f = Freshness::classify(TTL, TTL, Some(SWR));
        assert!(f.is_fresh());
    }

    #[test]
    fn test_stale_servable_inside_swr_window() {
        let f = Freshness::classify(Duration::from_millis(1200), TTL, Some(SWR));
        assert!(f.is_stale_servable());
    }

    #[test]
    fn test_expired_beyond_swr_window() {
        let f = Freshness::classify(Duration::from_millis(1501), TTL, Some(SWR));
        assert!(f.is_expired());
    }

    #[test]
    fn test_no_swr_means_stale_is_expired() {
        let f = Freshness::classify(Duration::from_millis(1001), TTL, None);
        assert!(f.is_expired());
    }

    #[test]
    fn test_zero_swr_disables_stale_band() {
        let f = Freshness::classify(Duration::from_millis(1001), TTL, Some(Duration::ZERO));
        assert!(f.is_expired());
    }

    fn band_rank(f: Freshness) -> u8 {
        match f {
            Freshness::Fresh => 0,
            Freshness::StaleServable => 1,
            Freshness::Expired => 2,
        }
    }

    proptest! {
        /// Aging an entry never moves it to a fresher band.
        #[test]
        fn classification_is_monotone_in_age(
            age_a in 0u64..10_000,
            age_b in 0u64..10_000,
            ttl in 1u64..5_000,
            swr in proptest::option::of(0u64..5_000),
        ) {
            let (lo, hi) = if age_a <= age_b { (age_a, age_b) } else { (age_b, age_a) };
            let classify = |age: u64| {
                Freshness::classify(
                    Duration::from_millis(age),
                    Duration::from_millis(ttl),
                    swr.map(Duration::from_millis),
                )
            };
            prop_assert!(band_rank(classify(lo)) <= band_rank(classify(hi)));
        }

        /// Anything at or under the ttl is fresh no matter the swr setting.
        #[test]
        fn within_ttl_is_always_fresh(
            ttl in 1u64..5_000,
            swr in proptest::option::of(0u64..5_000),
            frac in 0.0f64..=1.0,
        ) {
            let age = Duration::from_millis((ttl as f64 * frac) as u64);
            let f = Freshness::classify(
                age,
                Duration::from_millis(ttl),
                swr.map(Duration::from_millis),
            );
            prop_assert!(f.is_fresh());
        }
    }
}
