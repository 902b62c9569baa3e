//! # String Template
//!
//! Plain string key-value client over the pooled connection.

use std::time::Duration;

use redis::Commands;

use crate::connection::ConnectionHandle;
use crate::error::Result;

/// String key-value client sharing the process-wide pool
#[derive(Debug, Clone)]
pub struct StringTemplate {
    conn: ConnectionHandle,
}

impl StringTemplate {
    /// Wrap a connection handle
    #[must_use]
    pub const fn new(conn: ConnectionHandle) -> Self {
        Self { conn }
    }

    /// Underlying connection handle
    #[must_use]
    pub const fn connection(&self) -> &ConnectionHandle {
        &self.conn
    }

    /// Get a string value
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_owned();
        self.conn.run(move |conn| conn.get(key)).await
    }

    /// Set a string value without expiry
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let (key, value) = (key.to_owned(), value.to_owned());
        self.conn.run(move |conn| conn.set(key, value)).await
    }

    /// Set a string value that expires after `ttl`
    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let (key, value) = (key.to_owned(), value.to_owned());
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        self.conn.run(move |conn| conn.pset_ex(key, value, millis)).await
    }

    /// Delete a key, reporting whether it existed
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let key = key.to_owned();
        let deleted: i64 = self.conn.run(move |conn| conn.del(key)).await?;
        Ok(deleted > 0)
    }

    /// Check whether a key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let key = key.to_owned();
        self.conn.run(move |conn| conn.exists(key)).await
    }
}
