//! Lightweight admin HTTP listener
//!
//! Exposes `/healthz` and `/metrics`, with the metrics body provided by the caller.

use axum::http::StatusCode;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tracing::{error, info};

pub type MetricsFn = fn() -> (StatusCode, String);

async fn healthz() -> &'static str {
    "OK"
}

pub fn admin_router(metrics_fn: MetricsFn) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(move || async move { metrics_fn() }))
}

/// Spawn the admin listener on the current runtime.
/// Bind failures are logged; the main service keeps running without it.
pub fn spawn_admin_server(addr: String, metrics_fn: MetricsFn) {
    tokio::spawn(async move {
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!(%addr, error = %e, event = "admin_bind_failed", "admin server not started");
                return;
            }
        };
        info!(%addr, event = "admin_listening", "admin server listening");
        if let Err(e) = axum::serve(listener, admin_router(metrics_fn)).await {
            error!(%addr, error = %e, "admin server stopped");
        }
    });
}
