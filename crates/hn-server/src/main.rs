//! hn-server - Main entry point

use anyhow::Result;
use hn_common::logging::{init_logging, LogConfig};
use hn_ingest::{db, EtlRunner, EtlScheduler, HnClient, IngestConfig, PgConnector};
use std::{future::IntoFuture, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{signal, sync::Notify};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hn_server::{
    build_router, config::Config, middleware::auth::ApiKey, middleware::rate_limit, AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Environment variables take precedence over these defaults.
    let log_config = LogConfig::builder()
        .log_file_prefix("hn-server")
        .filter_directives("hn_server=debug,hn_ingest=info,tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    info!("Starting hn-server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let db_pool = db::create_pool(&config.database).await?;
    info!("Database connection pool established");

    db::run_migrations(&db_pool).await?;

    let etl_handle = if config.etl_enabled {
        let ingest_config = IngestConfig::from_env()?;
        let interval = ingest_config.interval;
        let client = HnClient::new(&ingest_config)?;
        let runner = EtlRunner::new(
            ingest_config,
            client,
            PgConnector::new(config.database.clone()),
        );
        info!("ETL is enabled, starting scheduler");
        let shutdown = CancellationToken::new();
        let handle = EtlScheduler::new(Arc::new(runner), interval, shutdown.clone()).start();
        Some((shutdown, handle))
    } else {
        info!("ETL is disabled (ETL_ENABLED=false)");
        None
    };

    let state = AppState {
        db: db_pool.clone(),
        api_key: ApiKey::new(config.auth.api_key.as_str()),
    };
    let app = rate_limit::with_rate_limit(build_router(state, &config.cors), &config.rate_limit)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown = Arc::new(Notify::new());
    let signalled = {
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.notify_one();
        }
    };

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(signalled)
    .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        _ = shutdown.notified() => {
            let timeout_secs = config.server.shutdown_timeout_secs;
            info!("Waiting up to {} seconds for connections to close", timeout_secs);
            match tokio::time::timeout(Duration::from_secs(timeout_secs), &mut server).await {
                Ok(result) => result?,
                Err(_) => warn!("Shutdown timeout elapsed, dropping open connections"),
            }
        },
    }

    if let Some((shutdown, mut handle)) = etl_handle {
        shutdown.cancel();
        let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
        if tokio::time::timeout(timeout, &mut handle).await.is_err() {
            // Dropping the run releases its pool without an explicit close.
            warn!("ETL run still in progress after shutdown timeout, aborting it");
            handle.abort();
        }
    }
    db_pool.close().await;

    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
