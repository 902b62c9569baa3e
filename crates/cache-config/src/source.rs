//! # Configuration Sources
//!
//! Lookup of dotted configuration keys (`redis.pool.minIdle`) from the
//! process environment, an in-memory map, or a parsed JSON document.

use std::collections::HashMap;
use std::env;

/// A read-only source of configuration values keyed by dotted names
pub trait ConfigSource {
    /// Get the raw value for a dotted key, if present
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads keys from environment variables.
///
/// `redis.pool.maxWaitMillis` is looked up as `REDIS_POOL_MAX_WAIT_MILLIS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl EnvSource {
    /// Translate a dotted camelCase key into its environment variable name
    #[must_use]
    pub fn env_key(key: &str) -> String {
        let mut out = String::with_capacity(key.len() + 8);
        let mut prev_lower = false;

        for ch in key.chars() {
            match ch {
                '.' | '-' => {
                    out.push('_');
                    prev_lower = false;
                }
                c if c.is_ascii_uppercase() => {
                    if prev_lower {
                        out.push('_');
                    }
                    out.push(c);
                    prev_lower = false;
                }
                c => {
                    out.push(c.to_ascii_uppercase());
                    prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
                }
            }
        }
        out
    }
}

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(Self::env_key(key)).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl ConfigSource for serde_json::Value {
    fn get(&self, key: &str) -> Option<String> {
        let mut node = self;
        for segment in key.split('.') {
            node = node.get(segment)?;
        }

        match node {
            Self::String(s) => Some(s.clone()),
            Self::Number(n) => Some(n.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Null | Self::Array(_) | Self::Object(_) => None,
        }
    }
}

impl<S: ConfigSource + ?Sized> ConfigSource for &S {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}
