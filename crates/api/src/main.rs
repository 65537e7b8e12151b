//! API server entry point.

use std::sync::Arc;

use api::{AppState, Config, StateSettings};
use cache::RedisCache;
use notify::AmqpPublisher;
use sqlx::postgres::PgPoolOptions;
use store::PostgresStore;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration (.env is optional)
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // 2. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    tracing::info!(?config, "configuration loaded");

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 4. Connect to PostgreSQL and run migrations
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.lock_timeout)
        .connect_with(config.database.connect_options()?)
        .await?;
    let store = PostgresStore::new(pool.clone()).with_lock_timeout(config.lock_timeout);
    store.run_migrations().await?;
    tracing::info!("database ready");

    // 5. Connect the cache and the notification broker
    let cache = RedisCache::new(&config.redis_url()).await?;
    let publisher = Arc::new(AmqpPublisher::connect(&config.rabbitmq_url).await?);

    // 6. Build the application
    let state = Arc::new(AppState::new(
        store,
        Arc::new(cache),
        publisher.clone(),
        StateSettings::from(&config),
    ));
    let app = api::create_app(state, metrics_handle, api::cors_layer(&config.cors_origins));

    // 7. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 8. Release clients
    if let Err(e) = publisher.close().await {
        tracing::warn!(error = %e, "failed to close AMQP connection cleanly");
    }
    pool.close().await;

    tracing::info!("server shut down gracefully");
    Ok(())
}
