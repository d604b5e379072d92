use std::sync::Arc;

use anyhow::Context;
use burrow_core::Storage;
use burrow_gateway::auth::TokenSigner;
use burrow_gateway::config::StorageBackend;
use burrow_gateway::state::AppState;
use burrow_gateway::{telemetry, App, Config};
use burrow_shortener::{ServiceConfig, ShortenerService};
use burrow_storage::{FileStorage, InMemoryStorage, PostgresStorage};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    telemetry::init(&config.log_level, config.log_format)?;

    let backend = config.storage_backend();
    info!(
        listen_addr = %config.server_address,
        base_url = %config.base_url,
        storage_backend = %backend,
        "starting burrow"
    );

    match backend {
        StorageBackend::Memory => run(config, InMemoryStorage::new()).await,
        StorageBackend::File(path) => run(config, FileStorage::new(path)).await,
        StorageBackend::Postgres(dsn) => {
            let storage = PostgresStorage::connect(&dsn)
                .await
                .context("failed to connect to postgres")?;
            run(config, storage).await
        }
    }
}

async fn run<S: Storage>(config: Config, storage: S) -> anyhow::Result<()> {
    storage
        .bootstrap()
        .await
        .context("failed to prepare storage")?;
    let storage = Arc::new(storage);

    let service_config = ServiceConfig::builder()
        .base_url(config.base_url.clone())
        .operation_timeout(config.request_timeout)
        .flush_interval(config.delete_flush_interval)
        .build();
    let service = Arc::new(ShortenerService::new(Arc::clone(&storage), service_config));

    let state = AppState::new(service.clone(), TokenSigner::new(&config.secret_key));
    let router = App::router(state);

    let listener = TcpListener::bind(config.server_address)
        .await
        .with_context(|| format!("failed to bind {}", config.server_address))?;
    info!(listen_addr = %listener.local_addr()?, "http server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    info!("draining pending deletions");
    service.shutdown().await;
    if let Err(err) = storage.close().await {
        warn!(error = %err, "failed to close storage");
    }
    info!("burrow stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
