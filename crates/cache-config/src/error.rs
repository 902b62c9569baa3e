//! Cache wiring error types

use thiserror::Error;

/// Errors raised while configuring or using the Redis cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection pool exhausted after waiting {waited_ms}ms")]
    PoolExhausted { waited_ms: u64 },

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cache context already initialized")]
    AlreadyInitialized,

    #[error("Blocking cache task failed: {0}")]
    Task(String),
}

impl CacheError {
    /// Build a configuration error for a single key
    pub(crate) fn invalid(key: &str, reason: impl std::fmt::Display) -> Self {
        Self::Configuration(format!("`{key}`: {reason}"))
    }

    /// Whether the error means the backend could not be reached
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            Self::Connection(err.to_string())
        } else {
            Self::Redis(err.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_io_error_is_connection() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: CacheError = redis::RedisError::from(io).into();
        assert!(err.is_connection());
    }

    #[test]
    fn test_redis_response_error_is_command_error() {
        let err: CacheError =
            redis::RedisError::from((redis::ErrorKind::ResponseError, "WRONGTYPE")).into();
        assert!(matches!(err, CacheError::Redis(_)));
    }

    #[test]
    fn test_invalid_message_names_key() {
        let err = CacheError::invalid("redis.port", "out of range");
        assert_eq!(err.to_string(), "Configuration error: `redis.port`: out of range");
    }
}
