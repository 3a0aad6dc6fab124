use axum::Router;
use configs::{RelationalConfig, StorageConfig};
use service::{blob_service::StorageService, relational::RelationalService};
use tokio::net::TcpListener;
use tracing::info;

use crate::errors::StartupError;
use crate::routes::{self, relational, storage};

pub fn build_relational_router(svc: RelationalService) -> Router {
    routes::with_common_layers(relational::router(svc))
}

pub fn build_storage_router(svc: StorageService, upload_limit_bytes: usize) -> Router {
    routes::with_common_layers(storage::router(svc, upload_limit_bytes))
}

async fn bind(addr: String) -> Result<TcpListener, StartupError> {
    TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })
}

/// Serve API-1. The pool is connected by the first request that needs it.
pub async fn run_relational(cfg: RelationalConfig) -> Result<(), StartupError> {
    let svc = RelationalService::new(cfg.database.clone());
    let app = build_relational_router(svc);

    let addr = cfg.bind_addr();
    let listener = bind(addr.clone()).await?;
    info!(%addr, service = relational::SERVICE_NAME, event = "listening", "relational backend listening");
    axum::serve(listener, app).await.map_err(anyhow::Error::from)?;
    Ok(())
}

/// Serve API-2. Container creation is attempted once in the background at
/// startup; a failure there is logged and retried by later requests.
pub async fn run_storage(cfg: StorageConfig) -> Result<(), StartupError> {
    let svc = StorageService::new(cfg.clone());
    let warm = svc.clone();
    tokio::spawn(async move { warm.warm_up().await });
    let app = build_storage_router(svc, cfg.upload_limit_bytes);

    let addr = cfg.bind_addr();
    let listener = bind(addr.clone()).await?;
    info!(%addr, service = storage::SERVICE_NAME, kind = ?cfg.kind, container = %cfg.container, event = "listening", "storage backend listening");
    axum::serve(listener, app).await.map_err(anyhow::Error::from)?;
    Ok(())
}
