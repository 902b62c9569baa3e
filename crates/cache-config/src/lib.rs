//! # Redis Cache Configuration
//!
//! Turns externally supplied settings into a pooled Redis connection, a
//! string key-value client and a cache manager.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        ConfigSource (environment, map, JSON document)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  load_settings
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │            ConnectionSettings + PoolSettings                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  build_pool / build_connection
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │          ConnectionHandle (r2d2 pool of redis)              │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                   │  build_cache_manager
//!                    ▼                   ▼
//! ┌─────────────────────────┐   ┌──────────────────────────────┐
//! │     StringTemplate      │   │ CacheManager (non-locking)   │
//! └─────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cache_config::{CacheConfigLoader, EnvSource};
//!
//! let ctx = CacheConfigLoader::new(EnvSource).bootstrap()?;
//! ctx.connection().validate().await?;
//!
//! let cache = ctx.cache_manager();
//! cache.put("k", "v").await?;
//! assert_eq!(cache.get("k").await?.as_deref(), Some("v"));
//! cache.evict("k").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod cache;
pub mod connection;
pub mod context;
pub mod error;
pub mod loader;
pub mod pool;
pub mod settings;
pub mod source;
pub mod template;

// Re-export commonly used types
pub use cache::{
    CacheDefaults, CacheManager, CacheStatsSnapshot, NonLockingCacheWriter, RedisCache,
    build_cache_manager,
};
pub use connection::{ConnectionHandle, PoolState, build_connection};
pub use context::CacheContext;
pub use error::{CacheError, Result};
pub use loader::CacheConfigLoader;
pub use pool::{PoolConfig, build_pool};
pub use settings::{ConnectionSettings, MaxWait, PoolSettings};
pub use source::{ConfigSource, EnvSource};
pub use template::StringTemplate;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build every handle from environment variables (`REDIS_HOST`, ...)
///
/// # Errors
///
/// Returns [`CacheError::Configuration`] if the settings are missing or
/// malformed.
pub fn init_from_env() -> Result<CacheContext> {
    CacheConfigLoader::new(EnvSource).bootstrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
