//! # Bootstrap Configuration
//!
//! Environment-based settings for the startup sequence itself. Redis
//! settings are read separately by `cache_config`.

use std::env;

/// Startup policy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Logging level used when `RUST_LOG` is unset
    pub log_level: String,

    /// Refuse to start when the cache cannot be configured
    pub cache_required: bool,

    /// PING the backend before publishing the handles
    pub validate_on_startup: bool,
}

fn flag(value: Option<String>, default: bool) -> bool {
    value.map_or(default, |v| {
        matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
    })
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            cache_required: flag(env::var("CACHE_REQUIRED").ok(), true),
            validate_on_startup: flag(env::var("CACHE_VALIDATE_ON_STARTUP").ok(), true),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
