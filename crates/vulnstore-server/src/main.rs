// vulnstore HTTP server
// Loads configuration, opens the store, and serves the ingestion and query routes

mod error;
mod response;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use vulnstore_lib::repositories::VulnerabilityRepository;
use vulnstore_lib::services::ingest::{cancel_pair, CancelHandle, HttpFetcher, IngestDispatcher};
use vulnstore_lib::utils::config::AppConfig;
use vulnstore_lib::utils::database::{Database, CONNECT_RETRY_DELAY};

use crate::error::StartupError;
use crate::routes::{router, AppState};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("[server] {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;

    let path = config.database_path.clone();
    let attempts = config.db_connect_attempts;
    let db = tokio::task::spawn_blocking(move || {
        Database::open_with_retry(&path, attempts, CONNECT_RETRY_DELAY)
    })
    .await
    .map_err(|e| StartupError::Connection(e.to_string()))?
    .map_err(StartupError::Connection)?;

    let fetcher = HttpFetcher::new(config.fetch.clone()).map_err(StartupError::HttpClient)?;
    let (cancel, _signal) = cancel_pair();
    let cancel = Arc::new(cancel);

    let state = AppState {
        dispatcher: IngestDispatcher::new(db.clone(), Arc::new(fetcher), config.worker_count),
        vulnerabilities: Arc::new(VulnerabilityRepository::new(db)),
        default_source: config.default_source.clone(),
        cancel: cancel.clone(),
    };

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;

    log::info!(
        "[server] Listening on http://{} ({} workers, database {})",
        addr,
        config.worker_count,
        config.database_path.display()
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await
        .map_err(StartupError::Serve)?;

    log::info!("[server] Stopped");
    Ok(())
}

/// Resolve on Ctrl+C and cancel any batch still running
async fn shutdown_signal(cancel: Arc<CancelHandle>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("[server] Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("[server] Shutdown requested, cancelling in-flight batches");
    cancel.cancel();
}
