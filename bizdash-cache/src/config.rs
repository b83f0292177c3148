//! Cache manager configuration.

use std::time::Duration;

/// Default lifetime of a cached module payload.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Configuration for [`ModuleCacheManager`](crate::ModuleCacheManager).
///
/// Fixed per manager instance; individual loads cannot override it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a fetched payload stays usable without refetching.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the entry TTL in milliseconds.
    pub fn with_ttl_ms(self, ttl_ms: u64) -> Self {
        self.with_ttl(Duration::from_millis(ttl_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttl_is_five_minutes() {
        assert_eq!(CacheConfig::default().ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::new().with_ttl_ms(1_500);
        assert_eq!(config.ttl, Duration::from_millis(1_500));
    }
}
