//! # Pool Configuration
//!
//! Translation of [`PoolSettings`] into the bounds handed to the `r2d2`
//! connection pool.

use std::time::Duration;

use crate::error::{CacheError, Result};
use crate::settings::{MaxWait, PoolSettings};

/// Timeout used when callers may wait indefinitely for a connection
pub const INDEFINITE_WAIT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Shortest checkout timeout the pool accepts
const MIN_CHECKOUT_WAIT: Duration = Duration::from_millis(1);

/// Upper bound on a direct connect attempt against an empty pool
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Pool bounds, copied verbatim from the loaded settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub min_idle: u32,
    pub max_idle: u32,
    pub max_total: u32,
    pub max_wait: MaxWait,
}

impl PoolConfig {
    /// Checkout timeout passed to the pool
    #[must_use]
    pub fn checkout_timeout(&self) -> Duration {
        match self.max_wait {
            MaxWait::Indefinite => INDEFINITE_WAIT,
            MaxWait::Bounded(wait) => wait.max(MIN_CHECKOUT_WAIT),
        }
    }

    /// Timeout for opening a connection directly, never longer than the
    /// checkout wait
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.checkout_timeout().min(CONNECT_TIMEOUT)
    }

    /// Idle floor handed to the pool, capped at `max_total`
    #[must_use]
    pub const fn effective_min_idle(&self) -> u32 {
        if self.min_idle > self.max_total {
            self.max_total
        } else {
            self.min_idle
        }
    }

    /// Reject the combination the pooling library refuses to build
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Configuration`] when `max_total` is zero.
    pub fn ensure_buildable(&self) -> Result<()> {
        if self.max_total == 0 {
            return Err(CacheError::invalid("pool.maxTotal", "must be greater than zero"));
        }
        Ok(())
    }

    /// Apply the bounds to an `r2d2` builder
    pub(crate) fn apply<M: r2d2::ManageConnection>(
        &self,
        builder: r2d2::Builder<M>,
    ) -> r2d2::Builder<M> {
        builder
            .max_size(self.max_total)
            .min_idle(Some(self.effective_min_idle()))
            .connection_timeout(self.checkout_timeout())
    }
}

/// Build the pool configuration from settings without validation
#[must_use]
pub const fn build_pool(settings: &PoolSettings) -> PoolConfig {
    PoolConfig {
        min_idle: settings.min_idle,
        max_idle: settings.max_idle,
        max_total: settings.max_total,
        max_wait: settings.max_wait,
    }
}
