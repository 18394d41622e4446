//! Cache configuration.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::invalidation::DistributedCacheInvalidation;

/// Supplier of monotonic nanoseconds. Injected so that tests can drive expiry
/// deterministically; it is the cache's sole source of time.
pub type ClockNanos = Arc<dyn Fn() -> u64 + Send + Sync>;

/// The default clock: nanoseconds on a process-local monotonic timeline.
pub fn monotonic_clock() -> ClockNanos {
    let origin = Instant::now();
    Arc::new(move || origin.elapsed().as_nanos() as u64)
}

/// Runtime configuration of a [`MemoryCacheBackend`](crate::MemoryCacheBackend).
#[derive(Clone)]
pub struct CacheConfig {
    /// Total byte budget of the cache, in MiB.
    pub(crate) capacity_mb: u64,
    /// Lifetime of positive reference entries. Absent or zero disables the
    /// positive reference cache entirely.
    pub(crate) reference_ttl: Option<Duration>,
    /// Lifetime of negative reference entries. Absent or zero disables
    /// negative reference caching.
    pub(crate) reference_negative_ttl: Option<Duration>,
    /// Serialized objects larger than this bypass the cache.
    pub(crate) max_obj_size: Option<usize>,
    pub(crate) clock_nanos: ClockNanos,
    pub(crate) invalidation: Option<Arc<dyn DistributedCacheInvalidation>>,
}

impl CacheConfig {
    pub fn new(capacity_mb: u64) -> Self {
        CacheConfig {
            capacity_mb,
            reference_ttl: None,
            reference_negative_ttl: None,
            max_obj_size: None,
            clock_nanos: monotonic_clock(),
            invalidation: None,
        }
    }

    pub fn with_reference_ttl(mut self, ttl: Duration) -> Self {
        self.reference_ttl = Some(ttl);
        self
    }

    pub fn with_reference_negative_ttl(mut self, ttl: Duration) -> Self {
        self.reference_negative_ttl = Some(ttl);
        self
    }

    pub fn with_max_obj_size(mut self, limit: usize) -> Self {
        self.max_obj_size = Some(limit);
        self
    }

    pub fn with_clock(mut self, clock: ClockNanos) -> Self {
        self.clock_nanos = clock;
        self
    }

    pub fn with_invalidation(mut self, sender: Arc<dyn DistributedCacheInvalidation>) -> Self {
        self.invalidation = Some(sender);
        self
    }

    pub fn capacity_mb(&self) -> u64 {
        self.capacity_mb
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("capacity_mb", &self.capacity_mb)
            .field("reference_ttl", &self.reference_ttl)
            .field("reference_negative_ttl", &self.reference_negative_ttl)
            .field("max_obj_size", &self.max_obj_size)
            .field("invalidation", &self.invalidation.is_some())
            .finish_non_exhaustive()
    }
}

/// The deserializable subset of [`CacheConfig`], for use in configuration
/// files. Durations use the humantime format (`30s`, `5m`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    pub capacity_mb: u64,
    #[serde(with = "humantime_serde")]
    pub reference_ttl: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub reference_negative_ttl: Option<Duration>,
    pub max_obj_size: Option<usize>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions {
            capacity_mb: 64,
            reference_ttl: None,
            reference_negative_ttl: None,
            max_obj_size: None,
        }
    }
}

impl CacheOptions {
    pub fn into_config(self) -> CacheConfig {
        CacheConfig {
            capacity_mb: self.capacity_mb,
            reference_ttl: self.reference_ttl,
            reference_negative_ttl: self.reference_negative_ttl,
            max_obj_size: self.max_obj_size,
            clock_nanos: monotonic_clock(),
            invalidation: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_deserialize_with_humantime_durations() {
        let options: CacheOptions = serde_json::from_str(
            r#"{"capacity_mb": 256, "reference_ttl": "30s", "reference_negative_ttl": "5s"}"#,
        )
        .unwrap();
        assert_eq!(options.capacity_mb, 256);
        assert_eq!(options.reference_ttl, Some(Duration::from_secs(30)));
        assert_eq!(options.reference_negative_ttl, Some(Duration::from_secs(5)));
        assert_eq!(options.max_obj_size, None);

        let config = options.into_config();
        assert_eq!(config.capacity_mb(), 256);
    }

    #[test]
    fn options_default_leaves_reference_caching_off() {
        let options: CacheOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, CacheOptions::default());
        assert!(options.reference_ttl.is_none());
    }
}
