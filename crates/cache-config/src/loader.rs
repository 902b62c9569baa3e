//! # Cache Config Loader
//!
//! Reads the `redis.*` settings from a [`ConfigSource`] and builds the
//! pool, connection and cache manager in order.

use std::fmt::Display;
use std::str::FromStr;

use crate::cache::build_cache_manager;
use crate::connection::build_connection;
use crate::context::CacheContext;
use crate::error::{CacheError, Result};
use crate::pool::build_pool;
use crate::settings::{
    ConnectionSettings, DEFAULT_MAX_IDLE, DEFAULT_MAX_TOTAL, DEFAULT_MAX_WAIT_MILLIS,
    DEFAULT_MIN_IDLE, MaxWait, PoolSettings,
};
use crate::source::ConfigSource;

/// Default key prefix
pub const DEFAULT_PREFIX: &str = "redis";

/// Loads Redis settings from a configuration source
#[derive(Debug, Clone)]
pub struct CacheConfigLoader<S> {
    source: S,
    prefix: String,
}

impl<S: ConfigSource> CacheConfigLoader<S> {
    /// Loader reading keys under `redis.`
    pub fn new(source: S) -> Self {
        Self {
            source,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Read keys under a different prefix; an empty prefix reads bare keys
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn key(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.prefix)
        }
    }

    fn raw(&self, name: &str) -> Option<(String, String)> {
        let key = self.key(name);
        self.source
            .get(&key)
            .map(|value| (key, value.trim().to_string()))
    }

    fn required<T>(&self, name: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let (key, value) = self
            .raw(name)
            .ok_or_else(|| CacheError::invalid(&self.key(name), "missing required setting"))?;
        value.parse().map_err(|e| CacheError::invalid(&key, e))
    }

    fn optional<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.raw(name) {
            Some((key, value)) => value.parse().map_err(|e| CacheError::invalid(&key, e)),
            None => Ok(default),
        }
    }

    /// Read connection and pool settings.
    ///
    /// Pool bounds are taken as given; only type conversion is checked.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Configuration`] if `host` is missing or empty,
    /// `port` is missing or outside 1-65535, or a value fails to parse.
    pub fn load_settings(&self) -> Result<(ConnectionSettings, PoolSettings)> {
        let host: String = self.required("host")?;
        if host.is_empty() {
            return Err(CacheError::invalid(&self.key("host"), "must not be empty"));
        }

        let port: i64 = self.required("port")?;
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                CacheError::invalid(&self.key("port"), format!("{port} is outside 1-65535"))
            })?;

        let connection = ConnectionSettings {
            host,
            port,
            database: self.optional("database", 0)?,
        };

        let pool = PoolSettings {
            min_idle: self.optional("pool.minIdle", DEFAULT_MIN_IDLE)?,
            max_idle: self.optional("pool.maxIdle", DEFAULT_MAX_IDLE)?,
            max_total: self.optional("pool.maxTotal", DEFAULT_MAX_TOTAL)?,
            max_wait: MaxWait::from_millis(
                self.optional("pool.maxWaitMillis", DEFAULT_MAX_WAIT_MILLIS)?,
            ),
        };

        tracing::debug!(
            endpoint = %connection,
            min_idle = pool.min_idle,
            max_idle = pool.max_idle,
            max_total = pool.max_total,
            max_wait_ms = pool.max_wait.as_millis(),
            "Redis settings loaded"
        );

        Ok((connection, pool))
    }

    /// Load settings and build every handle in dependency order
    ///
    /// # Errors
    ///
    /// Returns the first configuration error encountered.
    pub fn bootstrap(&self) -> Result<CacheContext> {
        let (connection_settings, pool_settings) = self.load_settings()?;
        let pool_config = build_pool(&pool_settings);
        let connection = build_connection(&connection_settings, &pool_config)?;
        let cache_manager = build_cache_manager(&connection);

        Ok(CacheContext::new(
            connection_settings,
            pool_settings,
            connection,
            cache_manager,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::Fake;
    use fake::faker::internet::en::DomainSuffix;
    use std::collections::HashMap;
    use std::time::Duration;

    fn source(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn full_source() -> HashMap<String, String> {
        source(&[
            ("redis.host", "localhost"),
            ("redis.port", "6379"),
            ("redis.pool.minIdle", "1"),
            ("redis.pool.maxIdle", "4"),
            ("redis.pool.maxTotal", "16"),
            ("redis.pool.maxWaitMillis", "2000"),
        ])
    }

    #[test]
    fn test_load_full_settings() {
        let (conn, pool) = CacheConfigLoader::new(full_source()).load_settings().unwrap();

        assert_eq!(conn.host, "localhost");
        assert_eq!(conn.port, 6379);
        assert_eq!(conn.database, 0);
        assert_eq!(pool.min_idle, 1);
        assert_eq!(pool.max_idle, 4);
        assert_eq!(pool.max_total, 16);
        assert_eq!(pool.max_wait, MaxWait::Bounded(Duration::from_secs(2)));
    }

    #[test]
    fn test_pool_keys_default() {
        let loader = CacheConfigLoader::new(source(&[
            ("redis.host", "localhost"),
            ("redis.port", "6379"),
        ]));
        let (_, pool) = loader.load_settings().unwrap();
        assert_eq!(pool, PoolSettings::default());
    }

    #[test]
    fn test_empty_host_rejected() {
        let mut map = full_source();
        map.insert("redis.host".to_string(), String::new());
        let err = CacheConfigLoader::new(map).load_settings().unwrap_err();
        assert!(matches!(err, CacheError::Configuration(_)));

        let mut blank = full_source();
        blank.insert("redis.host".to_string(), "   ".to_string());
        tokio_test::assert_err!(CacheConfigLoader::new(blank).load_settings());
    }

    #[test]
    fn test_missing_host_rejected() {
        let mut map = full_source();
        map.remove("redis.host");
        let err = CacheConfigLoader::new(map).load_settings().unwrap_err();
        assert!(err.to_string().contains("redis.host"));
    }

    #[test]
    fn test_port_out_of_range_rejected() {
        for bad in ["70000", "0", "-1", "65536", "http"] {
            let mut map = full_source();
            map.insert("redis.port".to_string(), bad.to_string());
            let err = CacheConfigLoader::new(map).load_settings().unwrap_err();
            assert!(matches!(err, CacheError::Configuration(_)), "port {bad}");
        }

        let mut edge = full_source();
        edge.insert("redis.port".to_string(), "65535".to_string());
        let (conn, _) = CacheConfigLoader::new(edge).load_settings().unwrap();
        assert_eq!(conn.port, 65535);
    }

    #[test]
    fn test_min_idle_above_max_idle_accepted() {
        let mut map = full_source();
        map.insert("redis.pool.minIdle".to_string(), "5".to_string());
        map.insert("redis.pool.maxIdle".to_string(), "2".to_string());

        let (_, pool) = CacheConfigLoader::new(map).load_settings().unwrap();
        let config = build_pool(&pool);
        assert_eq!((config.min_idle, config.max_idle), (5, 2));
    }

    #[test]
    fn test_negative_pool_bound_fails_conversion() {
        let mut map = full_source();
        map.insert("redis.pool.maxTotal".to_string(), "-3".to_string());
        let err = CacheConfigLoader::new(map).load_settings().unwrap_err();
        assert!(err.to_string().contains("redis.pool.maxTotal"));
    }

    #[test]
    fn test_negative_wait_is_indefinite() {
        let mut map = full_source();
        map.insert("redis.pool.maxWaitMillis".to_string(), "-1".to_string());
        let (_, pool) = CacheConfigLoader::new(map).load_settings().unwrap();
        assert_eq!(pool.max_wait, MaxWait::Indefinite);
    }

    #[test]
    fn test_custom_prefix_and_json_source() {
        let doc = serde_json::json!({
            "cache": { "host": "10.1.2.3", "port": 6380, "database": 3 }
        });
        let (conn, _) = CacheConfigLoader::new(&doc)
            .with_prefix("cache")
            .load_settings()
            .unwrap();
        assert_eq!(conn.url(), "redis://10.1.2.3:6380/3");
    }

    #[test]
    fn test_bootstrap_with_generated_settings() {
        for _ in 0..8 {
            let host = format!("cache.example.{}", DomainSuffix().fake::<String>());
            let port: u16 = (1u16..u16::MAX).fake();
            let max_total: u32 = (1u32..32).fake();
            let max_idle: u32 = (0..=max_total).fake();

            let mut map = source(&[("redis.pool.minIdle", "0"), ("redis.pool.maxWaitMillis", "100")]);
            map.insert("redis.host".to_string(), host.clone());
            map.insert("redis.port".to_string(), port.to_string());
            map.insert("redis.pool.maxIdle".to_string(), max_idle.to_string());
            map.insert("redis.pool.maxTotal".to_string(), max_total.to_string());

            let ctx = CacheConfigLoader::new(map).bootstrap().unwrap();
            assert_eq!(ctx.connection().settings().host, host);
            assert_eq!(ctx.connection().settings().port, port);
            assert_eq!(ctx.connection().pool_config().max_idle, max_idle);
            assert_eq!(ctx.connection().pool_config().max_total, max_total);
            assert!(ctx.cache_manager().cache_names().is_empty());
        }
    }
}
