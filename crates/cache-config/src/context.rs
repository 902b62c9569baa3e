//! # Cache Context
//!
//! The handles produced at startup, bundled so they can be passed around
//! explicitly or published once for the lifetime of the process.

use std::sync::{Arc, OnceLock};

use crate::cache::CacheManager;
use crate::connection::ConnectionHandle;
use crate::error::{CacheError, Result};
use crate::settings::{ConnectionSettings, PoolSettings};
use crate::template::StringTemplate;

static INSTALLED: OnceLock<CacheContext> = OnceLock::new();

/// Startup-built cache handles
#[derive(Debug, Clone)]
pub struct CacheContext {
    connection_settings: Arc<ConnectionSettings>,
    pool_settings: PoolSettings,
    connection: ConnectionHandle,
    template: StringTemplate,
    cache_manager: Arc<CacheManager>,
}

impl CacheContext {
    pub(crate) fn new(
        connection_settings: ConnectionSettings,
        pool_settings: PoolSettings,
        connection: ConnectionHandle,
        cache_manager: CacheManager,
    ) -> Self {
        let template = StringTemplate::new(connection.clone());
        Self {
            connection_settings: Arc::new(connection_settings),
            pool_settings,
            connection,
            template,
            cache_manager: Arc::new(cache_manager),
        }
    }

    #[must_use]
    pub fn connection_settings(&self) -> &ConnectionSettings {
        &self.connection_settings
    }

    #[must_use]
    pub const fn pool_settings(&self) -> &PoolSettings {
        &self.pool_settings
    }

    #[must_use]
    pub const fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// String key-value client
    #[must_use]
    pub const fn template(&self) -> &StringTemplate {
        &self.template
    }

    #[must_use]
    pub const fn cache_manager(&self) -> &Arc<CacheManager> {
        &self.cache_manager
    }

    /// Publish this context process-wide.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::AlreadyInitialized`] if a context was already
    /// installed; the rejected context is dropped with its pool.
    pub fn install(self) -> Result<&'static Self> {
        let endpoint = self.connection_settings.to_string();
        INSTALLED
            .set(self)
            .map_err(|_| CacheError::AlreadyInitialized)?;

        tracing::info!(%endpoint, "Cache context installed");
        INSTALLED.get().ok_or(CacheError::AlreadyInitialized)
    }

    /// The installed context, if any
    #[must_use]
    pub fn global() -> Option<&'static Self> {
        INSTALLED.get()
    }
}
