//! # Redis Cache Bootstrap
//!
//! Binary entry point: builds the cache handles in order, publishes them,
//! and keeps the pool open until shutdown.

mod config;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_config::{CacheConfigLoader, CacheContext, EnvSource};
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!(
        version = cache_config::VERSION,
        cache_required = config.cache_required,
        "Starting Redis cache bootstrap"
    );

    let context = match start_cache(&config).await {
        Ok(ctx) => Some(ctx),
        Err(e) if !config.cache_required => {
            tracing::warn!(error = %e, "Cache unavailable, continuing without cache");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "Cache startup failed");
            return Err(e);
        }
    };

    shutdown_signal().await;

    if let Some(ctx) = context {
        for name in ctx.cache_manager().cache_names() {
            let stats = ctx.cache_manager().cache(&name).statistics();
            tracing::info!(cache = %name, ?stats, hit_ratio = stats.hit_ratio(), "Cache statistics");
        }
        ctx.connection().close();
    }

    tracing::info!("Shut down gracefully");
    Ok(())
}

/// Load settings, build the handles, optionally validate, then publish
async fn start_cache(config: &Config) -> anyhow::Result<&'static CacheContext> {
    let ctx = CacheConfigLoader::new(EnvSource).bootstrap()?;

    if config.validate_on_startup {
        ctx.connection().validate().await?;
        tracing::info!(endpoint = %ctx.connection_settings(), "Redis connected");
    }

    let state = ctx.connection().state();
    tracing::info!(
        connections = state.connections,
        idle = state.idle_connections,
        "Redis pool state"
    );

    Ok(ctx.install()?)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
