//! # Pooled Redis Connection
//!
//! A lazily populated `r2d2` pool of Redis connections. Synchronous redis
//! calls run on tokio's blocking workers so async callers never stall the
//! runtime while waiting on the pool.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use serde::Serialize;

use crate::error::{CacheError, Result};
use crate::pool::PoolConfig;
use crate::settings::ConnectionSettings;

type RedisPool = r2d2::Pool<redis::Client>;
type PooledConnection = r2d2::PooledConnection<redis::Client>;

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolState {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Routes pool-internal connection failures into tracing
#[derive(Debug)]
struct TracingErrorHandler {
    endpoint: String,
}

impl r2d2::HandleError<redis::RedisError> for TracingErrorHandler {
    fn handle_error(&self, error: redis::RedisError) {
        tracing::warn!(endpoint = %self.endpoint, error = %error, "Redis pool failed to open connection");
    }
}

/// Shared handle to the pooled Redis connection.
///
/// Cloning is cheap and every clone checks out from the same pool. Closing
/// any clone closes the pool for all of them.
#[derive(Clone)]
pub struct ConnectionHandle {
    pool: Arc<RwLock<Option<RedisPool>>>,
    client: redis::Client,
    settings: Arc<ConnectionSettings>,
    pool_config: PoolConfig,
}

impl ConnectionHandle {
    /// Endpoint settings this handle connects to
    #[must_use]
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Pool bounds this handle was built with
    #[must_use]
    pub const fn pool_config(&self) -> &PoolConfig {
        &self.pool_config
    }

    /// Current pool occupancy; all zero once closed
    #[must_use]
    pub fn state(&self) -> PoolState {
        self.current_pool().map_or_else(PoolState::default, |pool| {
            let state = pool.state();
            PoolState {
                connections: state.connections,
                idle_connections: state.idle_connections,
            }
        })
    }

    /// Whether [`close`](Self::close) has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.current_pool().is_none()
    }

    /// Run a synchronous redis operation on a pooled connection.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Connection`] if the pool is closed or the
    /// backend could not be reached, [`CacheError::PoolExhausted`] if every
    /// connection stayed checked out, or the converted redis error raised
    /// by `op`.
    pub async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut redis::Connection) -> redis::RedisResult<T> + Send + 'static,
    {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = handle.checkout()?;
            op(&mut *conn).map_err(CacheError::from)
        })
        .await?
    }

    /// Check that the backend answers `PING`
    ///
    /// # Errors
    ///
    /// Returns the checkout or command error, or [`CacheError::Redis`] on an
    /// unexpected reply.
    pub async fn validate(&self) -> Result<()> {
        let reply: String = self.run(|conn| redis::cmd("PING").query(conn)).await?;
        if reply == "PONG" {
            tracing::debug!(endpoint = %self.settings, "Redis connection validated");
            Ok(())
        } else {
            Err(CacheError::Redis(format!("unexpected PING reply: {reply}")))
        }
    }

    /// Close the pool for every clone of this handle.
    ///
    /// Idle connections close immediately, checked-out ones when returned.
    /// Later operations fail with [`CacheError::Connection`].
    pub fn close(&self) {
        let pool = self
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(pool) = pool {
            let state = pool.state();
            tracing::info!(
                endpoint = %self.settings,
                connections = state.connections,
                idle = state.idle_connections,
                "Closing Redis connection pool"
            );
        }
    }

    fn current_pool(&self) -> Option<RedisPool> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Open one connection directly with a bounded timeout, so an empty pool
    /// never waits out its checkout timeout against a dead backend
    fn ensure_reachable(&self) -> Result<()> {
        let timeout = self.pool_config.connect_timeout();
        self.client
            .get_connection_with_timeout(timeout)
            .map(drop)
            .map_err(|err| {
                tracing::warn!(endpoint = %self.settings, error = %err, "Redis backend unreachable");
                CacheError::Connection(format!("{} unreachable: {err}", self.settings))
            })
    }

    fn checkout(&self) -> Result<PooledConnection> {
        let pool = self.current_pool().ok_or_else(|| {
            CacheError::Connection(format!("{} connection pool is closed", self.settings))
        })?;

        if pool.state().connections == 0 {
            self.ensure_reachable()?;
        }

        let started = Instant::now();
        pool.get().map_err(|err| {
            let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            if pool.state().connections == 0 {
                tracing::warn!(endpoint = %self.settings, waited_ms, error = %err, "Redis backend unreachable");
                CacheError::Connection(format!("{} unreachable: {err}", self.settings))
            } else {
                tracing::warn!(endpoint = %self.settings, waited_ms, "Redis connection pool exhausted");
                CacheError::PoolExhausted { waited_ms }
            }
        })
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("settings", &self.settings)
            .field("pool_config", &self.pool_config)
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Build the pooled connection handle.
///
/// The pool fills lazily: reachability is first checked by the first
/// operation (or an explicit [`ConnectionHandle::validate`]).
///
/// # Errors
///
/// Returns [`CacheError::Configuration`] if the endpoint does not form a
/// valid connection URL or the pool bounds cannot be built.
pub fn build_connection(
    settings: &ConnectionSettings,
    pool_config: &PoolConfig,
) -> Result<ConnectionHandle> {
    pool_config.ensure_buildable()?;

    let client = redis::Client::open(settings.url().as_str())
        .map_err(|e| CacheError::invalid("host", e))?;

    let pool = pool_config
        .apply(r2d2::Pool::builder())
        .error_handler(Box::new(TracingErrorHandler {
            endpoint: settings.to_string(),
        }))
        .build_unchecked(client.clone());

    tracing::info!(
        endpoint = %settings,
        min_idle = pool_config.min_idle,
        max_idle = pool_config.max_idle,
        max_total = pool_config.max_total,
        max_wait_ms = pool_config.max_wait.as_millis(),
        "Redis connection pool configured"
    );

    Ok(ConnectionHandle {
        pool: Arc::new(RwLock::new(Some(pool))),
        client,
        settings: Arc::new(settings.clone()),
        pool_config: *pool_config,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pool::build_pool;
    use crate::settings::{MaxWait, PoolSettings};
    use std::time::Duration;

    /// Port with nothing listening on loopback
    pub(crate) const CLOSED_PORT: u16 = 1;

    pub(crate) fn unreachable_handle() -> ConnectionHandle {
        let settings = ConnectionSettings {
            host: "127.0.0.1".to_string(),
            port: CLOSED_PORT,
            database: 0,
        };
        let pool = build_pool(&PoolSettings {
            min_idle: 0,
            max_idle: 2,
            max_total: 2,
            max_wait: MaxWait::from_millis(200),
        });
        build_connection(&settings, &pool).unwrap()
    }

    pub(crate) fn live_handle() -> ConnectionHandle {
        live_handle_with(PoolSettings {
            max_wait: MaxWait::from_millis(2000),
            ..PoolSettings::default()
        })
    }

    fn live_handle_with(pool: PoolSettings) -> ConnectionHandle {
        let port = std::env::var("REDIS_TEST_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(6379);
        let settings = ConnectionSettings {
            host: "localhost".to_string(),
            port,
            database: 0,
        };
        build_connection(&settings, &build_pool(&pool)).unwrap()
    }

    #[test]
    fn test_build_is_lazy() {
        let handle = unreachable_handle();
        assert_eq!(handle.settings().port, CLOSED_PORT);
        assert_eq!(handle.pool_config().max_total, 2);
        assert_eq!(handle.state().connections, 0);
    }

    #[test]
    fn test_build_rejects_zero_total() {
        let settings = ConnectionSettings {
            host: "127.0.0.1".to_string(),
            port: 6379,
            database: 0,
        };
        let pool = build_pool(&PoolSettings {
            max_total: 0,
            ..PoolSettings::default()
        });
        let err = build_connection(&settings, &pool).unwrap_err();
        assert!(matches!(err, CacheError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails_with_connection_error() {
        let handle = unreachable_handle();
        let started = Instant::now();

        let err = handle.validate().await.unwrap_err();

        assert!(err.is_connection(), "unexpected error: {err}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unreachable_backend_with_default_wait_fails_fast() {
        let settings = ConnectionSettings {
            host: "127.0.0.1".to_string(),
            port: CLOSED_PORT,
            database: 0,
        };
        let handle = build_connection(&settings, &build_pool(&PoolSettings::default())).unwrap();
        assert_eq!(handle.pool_config().max_wait, MaxWait::Indefinite);

        let result = tokio::time::timeout(Duration::from_secs(5), handle.validate())
            .await
            .expect("validate hung against an unreachable backend");

        let err = result.unwrap_err();
        assert!(err.is_connection(), "unexpected error: {err}");
    }

    #[test]
    fn test_min_idle_above_max_total_still_builds() {
        let settings = ConnectionSettings {
            host: "127.0.0.1".to_string(),
            port: CLOSED_PORT,
            database: 0,
        };
        let pool = build_pool(&PoolSettings {
            min_idle: 9,
            max_total: 8,
            max_wait: MaxWait::from_millis(100),
            ..PoolSettings::default()
        });

        let handle = build_connection(&settings, &pool).unwrap();
        assert_eq!(handle.pool_config().min_idle, 9);
        handle.close();
    }

    #[tokio::test]
    async fn test_operations_fail_after_close() {
        let handle = unreachable_handle();
        let clone = handle.clone();
        assert!(!clone.is_closed());

        handle.close();

        assert!(clone.is_closed());
        assert_eq!(clone.state(), PoolState::default());
        let err = clone.validate().await.unwrap_err();
        assert!(err.is_connection(), "unexpected error: {err}");
        assert!(err.to_string().contains("closed"));

        // closing twice is harmless
        clone.close();
    }

    #[test]
    #[ignore = "requires a running Redis server"]
    fn test_second_checkout_exhausts_single_connection_pool() {
        let handle = live_handle_with(PoolSettings {
            min_idle: 0,
            max_idle: 1,
            max_total: 1,
            max_wait: MaxWait::from_millis(200),
        });

        let _held = handle.checkout().unwrap();
        let err = handle.checkout().map(drop).unwrap_err();

        assert!(matches!(err, CacheError::PoolExhausted { .. }), "unexpected error: {err}");
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_validate_live() {
        let handle = live_handle();
        tokio_test::assert_ok!(handle.validate().await);
        assert!(handle.state().connections >= 1);
    }
}
