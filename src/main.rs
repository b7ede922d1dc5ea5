use anyhow::{Context, Result};
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use services::{
    account_pool::StorageAccountPool,
    catalog::MediaCatalog,
    media_store::{SqliteMediaStore, open_store},
    transfer::{FileTransferClient, SimulatedTransport},
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting wedding-media with config: {:?}", cfg);

    // --- Handle migration mode ---
    if migrate {
        let url = cfg
            .database_url
            .as_deref()
            .context("--migrate needs a database URL (WEDDING_MEDIA_DATABASE_URL)")?;
        let store = SqliteMediaStore::connect(url)
            .await
            .with_context(|| format!("opening database `{}`", url))?;
        store.migrate().await.context("creating media_items")?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize core services ---
    let pool = Arc::new(StorageAccountPool::default());
    let transport = Arc::new(SimulatedTransport {
        upload_latency: cfg.upload_latency(),
        delete_latency: cfg.delete_latency(),
        upload_success_rate: cfg.upload_success_rate,
        delete_success_rate: cfg.delete_success_rate,
    });
    let transfer = FileTransferClient::new(pool, transport, cfg.transfer_timeout());
    let store = open_store(cfg.database_url.as_deref()).await;
    tracing::info!("Media store backend: {}", store.backend_name());

    let catalog = Arc::new(MediaCatalog::new(
        store,
        transfer,
        cfg.upload_folder.clone(),
    ));

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes).with_state(catalog);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
