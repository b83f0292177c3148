//! Cache usage counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Loads served from a fresh entry.
    pub hits: u64,
    /// Fetches started (one per single-flight window).
    pub fetches: u64,
    /// Loads that joined a fetch already in flight.
    pub joins: u64,
    /// Fetches that ended in a fallback.
    pub failures: u64,
    /// Number of entries currently held.
    pub entry_count: u64,
}

impl CacheStats {
    /// Fraction of loads answered without starting a fetch (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.joins + self.fetches;
        if total == 0 {
            0.0
        } else {
            (self.hits + self.joins) as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    fetches: AtomicU64,
    joins: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn join(&self) {
        self.joins.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, entry_count: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            joins: self.joins.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            entry_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 6,
            joins: 2,
            fetches: 2,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = Counters::default();
        counters.hit();
        counters.fetch();
        counters.fetch();
        counters.failure();

        let stats = counters.snapshot(1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.fetches, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.joins, 0);
        assert_eq!(stats.entry_count, 1);
    }
}
