/// Auth Service - Main entry point
///
/// Starts the REST API with:
/// - PostgreSQL user repository
/// - Redis (optional) or in-memory rate limiting
/// - In-process token blacklist with periodic cleanup
use anyhow::{Context, Result};
use auth_service::{
    build_router,
    config::Settings,
    db::PgUserRepository,
    metrics,
    security::{
        rate_limit::{RateLimitStore, RedisRateLimitStore},
        RateLimiter, RevocationStore,
    },
    services::AuthService,
    tasks::{spawn_rate_limit_sweep, spawn_revocation_cleanup},
    telemetry, AppState,
};
use crypto_core::{SystemClock, TokenCodec};
use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    info!("Starting Auth Service");

    // Load configuration
    let settings = Settings::load().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");

    let clock = SystemClock::shared();

    // Keys are read once; the private key never leaves the codec
    let codec = TokenCodec::from_key_files(
        &settings.jwt.algorithm,
        &settings.jwt.private_key_path,
        &settings.jwt.public_key_path,
        settings.jwt.ttl_policy(),
        clock.clone(),
    )
    .context("Failed to initialize JWT keys")?;
    info!(algorithm = ?codec.algorithm(), "JWT keys initialized");

    // Initialize database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&settings.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    info!(
        "Database pool initialized with {} max connections",
        settings.database.max_connections
    );

    // Rate limiter backend
    let rate_limit_store: Option<Arc<dyn RateLimitStore>> = match &settings.redis.url {
        Some(url) => {
            let client = redis::Client::open(url.as_str()).context("Invalid REDIS_URL")?;
            let manager = ConnectionManager::new(client)
                .await
                .context("Failed to connect to Redis")?;
            info!("Redis connection manager initialized for rate limiting");
            Some(Arc::new(RedisRateLimitStore::new(
                manager,
                Duration::from_millis(settings.redis.timeout_ms),
                settings.rate_limit.key_grace(),
            )))
        }
        None => {
            info!("REDIS_URL not set; rate limits are kept in process memory");
            None
        }
    };
    let uses_memory_limiter = rate_limit_store.is_none();
    let rate_limiter = Arc::new(match rate_limit_store {
        Some(store) => RateLimiter::new(store, clock.clone()),
        None => RateLimiter::in_memory(settings.rate_limit.key_grace(), clock.clone()),
    });

    let revocations = Arc::new(RevocationStore::new(
        clock.clone(),
        settings.revocation.suspicion_threshold,
    ));

    let auth = Arc::new(AuthService::new(
        Arc::new(PgUserRepository::new(db_pool.clone())),
        Arc::new(codec),
        revocations.clone(),
    ));

    metrics::initialize_auth_metrics();

    // Background tasks
    let mut tasks = vec![spawn_revocation_cleanup(
        revocations,
        settings.revocation.cleanup_interval(),
    )];
    if uses_memory_limiter {
        tasks.push(spawn_rate_limit_sweep(
            rate_limiter.clone(),
            Duration::from_secs(settings.rate_limit.window_seconds),
        ));
    }

    let app_state = AppState::new(
        auth,
        rate_limiter,
        settings.rate_limit.clone(),
        &settings.admin.admin_email,
    );
    let app = build_router(app_state);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("REST API listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    for task in tasks {
        task.shutdown().await;
    }
    db_pool.close().await;

    info!("Auth service shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Shutting down gracefully...");
}
