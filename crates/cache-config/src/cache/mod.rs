//! # Cache Module
//!
//! Redis-backed cache manager with named caches and a non-locking writer.

pub mod manager;
pub mod stats;
pub mod writer;

pub use manager::{
    CacheDefaults, CacheManager, DEFAULT_CACHE_NAME, KEY_SEPARATOR, RedisCache,
    build_cache_manager,
};
pub use stats::{CacheStatistics, CacheStatsSnapshot};
pub use writer::NonLockingCacheWriter;
