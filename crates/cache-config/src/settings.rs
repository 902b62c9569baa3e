//! # Cache Settings
//!
//! Immutable connection and pool settings, populated once at startup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default idle connections kept warm
pub const DEFAULT_MIN_IDLE: u32 = 0;

/// Default upper bound on idle connections
pub const DEFAULT_MAX_IDLE: u32 = 8;

/// Default upper bound on open connections
pub const DEFAULT_MAX_TOTAL: u32 = 8;

/// Default checkout wait; negative means wait indefinitely
pub const DEFAULT_MAX_WAIT_MILLIS: i64 = -1;

/// Redis endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub database: i64,
}

impl ConnectionSettings {
    /// Connection URL understood by the redis client
    #[must_use]
    pub fn url(&self) -> String {
        if self.host.contains(':') {
            format!("redis://[{}]:{}/{}", self.host, self.port, self.database)
        } else {
            format!("redis://{}:{}/{}", self.host, self.port, self.database)
        }
    }
}

impl fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.database)
    }
}

/// How long a caller waits for a pooled connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxWait {
    /// Block until a connection frees up
    Indefinite,
    /// Give up after the duration
    Bounded(Duration),
}

impl MaxWait {
    /// Interpret a millisecond setting; any negative value waits indefinitely
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        u64::try_from(millis).map_or(Self::Indefinite, |ms| Self::Bounded(Duration::from_millis(ms)))
    }

    /// The setting back in milliseconds, `-1` for indefinite
    #[must_use]
    pub fn as_millis(&self) -> i64 {
        match self {
            Self::Indefinite => -1,
            Self::Bounded(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        }
    }
}

impl Default for MaxWait {
    fn default() -> Self {
        Self::from_millis(DEFAULT_MAX_WAIT_MILLIS)
    }
}

/// Connection pool bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    pub min_idle: u32,
    pub max_idle: u32,
    pub max_total: u32,
    pub max_wait: MaxWait,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_idle: DEFAULT_MIN_IDLE,
            max_idle: DEFAULT_MAX_IDLE,
            max_total: DEFAULT_MAX_TOTAL,
            max_wait: MaxWait::default(),
        }
    }
}
