//! HTTP server initialization and runtime setup.
//!
//! Handles database and cache connections, the view aggregator, and the Axum
//! server lifecycle including graceful shutdown.

use crate::application::services::{AuthService, UrlService};
use crate::config::Config;
use crate::infrastructure::cache::{CacheService, MemoryCache, RedisCache};
use crate::infrastructure::persistence::{PgShortUrlRepository, PgTokenRepository};
use crate::routes::app_router;
use crate::state::AppState;
use crate::utils::code_generator::RandomCodeGenerator;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

/// Connection attempts made at startup before giving up.
const CONNECT_ATTEMPTS: usize = 5;

/// Backoff between startup connection attempts: 200ms, 400ms, 800ms, ...
fn connect_backoff() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(2)
        .factor(100)
        .max_delay(Duration::from_secs(5))
        .map(jitter)
        .take(CONNECT_ATTEMPTS - 1)
}

/// Opens the PostgreSQL pool, retrying with exponential backoff.
///
/// # Errors
///
/// Returns an error if every attempt fails.
pub async fn connect_database(config: &Config) -> Result<PgPool> {
    let options = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime));

    let pool = Retry::spawn(connect_backoff(), || {
        let options = options.clone();
        async move {
            options
                .connect(&config.database_url)
                .await
                .inspect_err(|e| tracing::warn!(error = %e, "Database connection attempt failed"))
        }
    })
    .await
    .context("Failed to connect to database")?;

    tracing::info!("Connected to database");
    Ok(pool)
}

/// Connects the configured cache.
///
/// Redis when configured, retrying with exponential backoff; otherwise the
/// in-process [`MemoryCache`], which is only correct for a single instance.
///
/// # Errors
///
/// Returns an error if Redis is configured but unreachable.
pub async fn connect_cache(config: &Config) -> Result<Arc<dyn CacheService>> {
    let Some(redis_url) = &config.redis_url else {
        tracing::info!("Cache: in-process (REDIS_URL not set)");
        return Ok(Arc::new(MemoryCache::new(
            Duration::from_secs(config.cache_ttl_seconds),
            Duration::from_secs(config.verification_code_ttl_seconds),
        )));
    };

    let redis = Retry::spawn(connect_backoff(), || async move {
        RedisCache::connect(
            redis_url,
            config.cache_ttl_seconds,
            config.verification_code_ttl_seconds,
        )
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Redis connection attempt failed"))
    })
    .await
    .context("Failed to connect to Redis")?;

    Ok(Arc::new(redis))
}

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool and migrations
/// - Redis cache (or the in-process fallback)
/// - The single view aggregator task
/// - Axum HTTP server
///
/// On SIGINT/SIGTERM the server stops accepting connections and drains
/// in-flight requests for at most `SHUTDOWN_GRACE_SECONDS`. The aggregator
/// then runs its final sweep and stops, and the pool is closed.
///
/// # Errors
///
/// Returns an error if:
/// - Database or cache connection fails
/// - Migrations fail
/// - Server bind fails
pub async fn run(config: Config) -> Result<()> {
    let pool = connect_database(&config).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations applied");

    let cache = connect_cache(&config).await?;

    let pool_arc = Arc::new(pool.clone());
    let repository = Arc::new(PgShortUrlRepository::new(pool_arc.clone()));
    let token_repository = Arc::new(PgTokenRepository::new(pool_arc));

    let generator = RandomCodeGenerator::new(&config.short_code_alphabet, config.short_code_length)
        .context("Invalid short code settings")?;

    let url_service = Arc::new(UrlService::new(
        repository.clone(),
        cache.clone(),
        Arc::new(generator),
        config.base_url.clone(),
        config.default_url_duration(),
    ));
    let auth_service = Arc::new(AuthService::new(
        token_repository,
        config.token_signing_secret.clone(),
    ));

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // exactly one aggregator per deployment
    let aggregator = url_service.view_aggregator();
    let sync_status = aggregator.status();
    let (sync_shutdown_tx, sync_shutdown_rx) = watch::channel(false);
    let aggregator_task =
        tokio::spawn(aggregator.run(config.view_sync_interval(), sync_shutdown_rx));
    tracing::info!(
        interval_secs = config.view_sync_interval_seconds,
        "View aggregator started"
    );

    let state = AppState {
        url_service,
        auth_service,
        repository,
        cache,
        sync_status,
    };

    let app = app_router(state, config.rate_limit());
    tracing::info!("Listening on http://{addr}");

    let (stop_tx, stop_rx) = watch::channel(false);
    let server = tokio::spawn(
        axum::serve(
            listener,
            ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
        )
        .with_graceful_shutdown(wait_for(stop_rx))
        .into_future(),
    );

    let served = wait_for_server(server, stop_tx, config.shutdown_grace(), shutdown_signal()).await;
    match &served {
        Ok(()) => tracing::info!("HTTP server stopped"),
        Err(e) => tracing::error!(error = %e, "HTTP server failed"),
    }

    stop_aggregator(sync_shutdown_tx, aggregator_task).await;

    pool.close().await;
    tracing::info!("Shutdown complete");

    served
}

/// Waits for the server task to end on its own or for `signal`.
///
/// On `signal` the server is told to stop and gets `grace` to drain open
/// connections before it is aborted.
async fn wait_for_server(
    mut server: JoinHandle<std::io::Result<()>>,
    stop_tx: watch::Sender<bool>,
    grace: Duration,
    signal: impl Future<Output = ()>,
) -> Result<()> {
    tokio::select! {
        res = &mut server => {
            return Ok(res.context("Server task panicked")??);
        }
        _ = signal => {}
    }

    let _ = stop_tx.send(true);
    match tokio::time::timeout(grace, &mut server).await {
        Ok(res) => Ok(res.context("Server task panicked")??),
        Err(_) => {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "Grace period elapsed, dropping open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

/// Signals the aggregator and waits for its final sweep.
async fn stop_aggregator(tx: watch::Sender<bool>, task: JoinHandle<()>) {
    let _ = tx.send(true);
    if let Err(e) = task.await {
        tracing::error!(error = %e, "View aggregator task failed");
    }
}

fn wait_for(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! { _ = ctrl_c => {}, _ = terminate => {}, }
    tracing::info!("Shutdown signal received");
}
