//! Non-locking cache writer.
//!
//! Every operation is a single Redis command (or a scan followed by batched
//! deletes for `clean`). No lock key guards concurrent writers, so the last
//! write to a key wins.

use std::time::Duration;

use redis::Commands;

use crate::connection::ConnectionHandle;
use crate::error::Result;

/// Keys deleted per `DEL` while cleaning a cache
const CLEAN_BATCH: usize = 500;

fn ttl_millis(ttl: Option<Duration>) -> Option<u64> {
    ttl.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1))
}

/// Raw byte-level cache writer over the pooled connection
#[derive(Debug, Clone)]
pub struct NonLockingCacheWriter {
    conn: ConnectionHandle,
}

impl NonLockingCacheWriter {
    #[must_use]
    pub const fn new(conn: ConnectionHandle) -> Self {
        Self { conn }
    }

    /// Underlying connection handle
    #[must_use]
    pub const fn connection(&self) -> &ConnectionHandle {
        &self.conn
    }

    /// Read a stored value
    pub async fn get(&self, name: &str, key: &str) -> Result<Option<Vec<u8>>> {
        tracing::trace!(cache = name, key, "GET");
        let key = key.to_owned();
        self.conn.run(move |conn| conn.get(key)).await
    }

    /// Store a value, overwriting any existing one
    pub async fn put(
        &self,
        name: &str,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        tracing::trace!(cache = name, key, bytes = value.len(), "SET");
        let key = key.to_owned();
        let ttl = ttl_millis(ttl);
        self.conn
            .run(move |conn| match ttl {
                Some(ms) => conn.pset_ex(key, value, ms),
                None => conn.set(key, value),
            })
            .await
    }

    /// Store a value only if the key is vacant.
    ///
    /// Returns the value already present when the write was skipped.
    pub async fn put_if_absent(
        &self,
        name: &str,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<Option<Vec<u8>>> {
        tracing::trace!(cache = name, key, "SET NX");
        let key = key.to_owned();
        let ttl = ttl_millis(ttl);
        self.conn
            .run(move |conn| {
                let mut cmd = redis::cmd("SET");
                cmd.arg(&key).arg(value).arg("NX");
                if let Some(ms) = ttl {
                    cmd.arg("PX").arg(ms);
                }

                let stored: Option<String> = cmd.query(conn)?;
                if stored.is_some() {
                    Ok(None)
                } else {
                    conn.get(&key)
                }
            })
            .await
    }

    /// Delete a key, returning how many keys went (0 or 1)
    pub async fn remove(&self, name: &str, key: &str) -> Result<u64> {
        tracing::trace!(cache = name, key, "DEL");
        let key = key.to_owned();
        self.conn.run(move |conn| conn.del(key)).await
    }

    /// Delete every key matching a glob pattern, returning how many went
    pub async fn clean(&self, name: &str, pattern: &str) -> Result<u64> {
        let pattern = pattern.to_owned();
        let removed = self
            .conn
            .run(move |conn| {
                let keys: Vec<String> = conn.scan_match::<_, String>(&pattern)?.collect();

                let mut removed = 0u64;
                for chunk in keys.chunks(CLEAN_BATCH) {
                    let deleted: u64 = conn.del(chunk)?;
                    removed += deleted;
                }
                Ok(removed)
            })
            .await?;

        tracing::debug!(cache = name, removed, "Cache cleaned");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis() {
        assert_eq!(ttl_millis(None), None);
        assert_eq!(ttl_millis(Some(Duration::from_secs(2))), Some(2000));
        assert_eq!(ttl_millis(Some(Duration::from_micros(10))), Some(1));
    }
}
