//! # Redis Cache Manager
//!
//! Named caches over a [`NonLockingCacheWriter`]. Caches are created on
//! first request and share the writer (and so the connection pool).

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use super::stats::{CacheStatistics, CacheStatsSnapshot};
use super::writer::NonLockingCacheWriter;
use crate::connection::ConnectionHandle;
use crate::error::{CacheError, Result};

/// Cache used by the manager-level `get` / `put` / `evict`
pub const DEFAULT_CACHE_NAME: &str = "default";

/// Separator between cache name and key
pub const KEY_SEPARATOR: &str = "::";

/// Entry configuration applied to every cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDefaults {
    /// Entry expiry; `None` keeps entries until evicted
    pub ttl: Option<Duration>,
    /// Prefix keys with `{cache_name}::`
    pub use_prefix: bool,
}

impl Default for CacheDefaults {
    fn default() -> Self {
        Self {
            ttl: None,
            use_prefix: true,
        }
    }
}

/// Escape glob metacharacters so a literal string matches only itself in
/// `SCAN MATCH`
fn escape_glob(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for ch in literal.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn decode_utf8(key: &str, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| CacheError::Serialization(format!("key `{key}`: {e}")))
}

impl CacheDefaults {
    fn key_prefix(&self, name: &str) -> String {
        if self.use_prefix {
            format!("{name}{KEY_SEPARATOR}")
        } else {
            String::new()
        }
    }
}

/// A single named cache
#[derive(Debug, Clone)]
pub struct RedisCache {
    name: Arc<str>,
    writer: NonLockingCacheWriter,
    defaults: CacheDefaults,
    stats: Arc<CacheStatistics>,
}

impl RedisCache {
    fn new(name: &str, writer: NonLockingCacheWriter, defaults: CacheDefaults) -> Self {
        Self {
            name: Arc::from(name),
            writer,
            defaults,
            stats: Arc::new(CacheStatistics::default()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Redis key backing a cache key
    #[must_use]
    pub fn cache_key(&self, key: &str) -> String {
        format!("{}{key}", self.defaults.key_prefix(&self.name))
    }

    /// Get the raw bytes stored under `key`
    pub async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.writer.get(&self.name, &self.cache_key(key)).await?;
        self.stats.record_lookup(value.is_some());
        Ok(value)
    }

    /// Get a UTF-8 string stored under `key`
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_bytes(key)
            .await?
            .map(|bytes| decode_utf8(key, bytes))
            .transpose()
    }

    /// Get a JSON value stored under `key`
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store raw bytes under `key`
    pub async fn put_bytes(&self, key: &str, value: &[u8]) -> Result<()> {
        self.writer
            .put(&self.name, &self.cache_key(key), value.to_vec(), self.defaults.ttl)
            .await?;
        self.stats.record_put();
        Ok(())
    }

    /// Store a string under `key`
    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.put_bytes(key, value.as_bytes()).await
    }

    /// Store a value as JSON under `key`
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put_bytes(key, &bytes).await
    }

    /// Store a string unless `key` already holds a value.
    ///
    /// Returns the existing value when nothing was written; a non-UTF-8
    /// existing value is a [`CacheError::Serialization`] as with `get`.
    pub async fn put_if_absent(&self, key: &str, value: &str) -> Result<Option<String>> {
        let existing = self
            .writer
            .put_if_absent(
                &self.name,
                &self.cache_key(key),
                value.as_bytes().to_vec(),
                self.defaults.ttl,
            )
            .await?;

        match existing {
            Some(bytes) => decode_utf8(key, bytes).map(Some),
            None => {
                self.stats.record_put();
                Ok(None)
            }
        }
    }

    /// Remove `key` from the cache
    pub async fn evict(&self, key: &str) -> Result<()> {
        let removed = self.writer.remove(&self.name, &self.cache_key(key)).await?;
        self.stats.record_deletes(removed);
        Ok(())
    }

    /// `SCAN MATCH` pattern covering exactly this cache's keys
    #[must_use]
    pub fn clear_pattern(&self) -> String {
        format!("{}*", escape_glob(&self.defaults.key_prefix(&self.name)))
    }

    /// Remove every entry of this cache
    pub async fn clear(&self) -> Result<u64> {
        let removed = self.writer.clean(&self.name, &self.clear_pattern()).await?;
        self.stats.record_deletes(removed);
        Ok(removed)
    }

    #[must_use]
    pub fn statistics(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

/// Hands out named caches backed by Redis
#[derive(Debug)]
pub struct CacheManager {
    writer: NonLockingCacheWriter,
    defaults: CacheDefaults,
    caches: RwLock<HashMap<String, RedisCache>>,
}

impl CacheManager {
    #[must_use]
    pub fn new(writer: NonLockingCacheWriter, defaults: CacheDefaults) -> Self {
        Self {
            writer,
            defaults,
            caches: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn defaults(&self) -> &CacheDefaults {
        &self.defaults
    }

    /// Get a named cache, creating it on first use
    #[must_use]
    pub fn cache(&self, name: &str) -> RedisCache {
        if let Some(cache) = self
            .caches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return cache.clone();
        }

        let mut caches = self.caches.write().unwrap_or_else(PoisonError::into_inner);
        caches
            .entry(name.to_owned())
            .or_insert_with(|| {
                tracing::debug!(cache = name, "Creating Redis cache");
                RedisCache::new(name, self.writer.clone(), self.defaults)
            })
            .clone()
    }

    /// Names of the caches created so far, sorted
    #[must_use]
    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .caches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Get a value from the default cache
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.cache(DEFAULT_CACHE_NAME).get(key).await
    }

    /// Put a value into the default cache
    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.cache(DEFAULT_CACHE_NAME).put(key, value).await
    }

    /// Evict a key from the default cache
    pub async fn evict(&self, key: &str) -> Result<()> {
        self.cache(DEFAULT_CACHE_NAME).evict(key).await
    }
}

/// Build the cache manager with default entry configuration
#[must_use]
pub fn build_cache_manager(conn: &ConnectionHandle) -> CacheManager {
    let writer = NonLockingCacheWriter::new(conn.clone());
    let manager = CacheManager::new(writer, CacheDefaults::default());
    tracing::info!(endpoint = %conn.settings(), "Redis cache manager ready");
    manager
}
