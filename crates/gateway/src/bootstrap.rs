use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{ConnectInfo, Request},
    middleware::{self, Next},
    response::Response,
    routing::{any, get},
    Json, Router,
};
use common::admin_http::spawn_admin_server;
use common::env::check_static_dir;
use common::types::Health;
use configs::GatewayConfig;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use crate::config::{RouteTable, Upstream};
use crate::observability;
use crate::proxy::{build_client, forward, ProxyState};

pub const SERVICE_NAME: &str = "frontend";

async fn health() -> Json<Health> {
    Json(Health::healthy(SERVICE_NAME))
}

/// Access log line per request: method, uri and the client address when known.
async fn access_log(req: Request, next: Next) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.to_string())
        .unwrap_or_else(|| "-".to_string());
    info!(method = %req.method(), uri = %req.uri(), %client, event = "access", "request");
    next.run(req).await
}

fn proxy_router(client: reqwest::Client, upstream: &Upstream) -> Router {
    let prefix = upstream.prefix.clone();
    let state = ProxyState { client, upstream: Arc::new(upstream.clone()) };
    Router::new()
        .route(&prefix, any(forward))
        .route(&format!("{prefix}/"), any(forward))
        .route(&format!("{prefix}/*rest"), any(forward))
        .with_state(state)
}

/// Full gateway router: local endpoints and static assets (with a body limit)
/// merged with the proxy prefixes (without one).
pub fn build_router(cfg: &GatewayConfig) -> anyhow::Result<Router> {
    let table = RouteTable::from_config(cfg);
    let client = build_client(cfg)?;

    let static_dir = Path::new(&cfg.static_dir);
    let index = static_dir.join(&cfg.index_file);
    let assets = ServeDir::new(static_dir).fallback(ServeFile::new(index));

    let client_config = table.client_config();
    let local = Router::new()
        .route("/health", get(health))
        .route(
            "/api/config",
            get(move || {
                let body = client_config.clone();
                async move { Json(body) }
            }),
        )
        .fallback_service(assets)
        .layer(RequestBodyLimitLayer::new(cfg.body_limit_bytes));

    let mut app = local;
    for upstream in table.upstreams() {
        app = app.merge(proxy_router(client.clone(), upstream));
    }

    Ok(app
        .layer(middleware::from_fn(access_log))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        ))
}

pub async fn run(cfg: GatewayConfig) -> anyhow::Result<()> {
    check_static_dir(Path::new(&cfg.static_dir), &cfg.index_file).await;

    if let Some(addr) = cfg.admin_addr.clone() {
        spawn_admin_server(addr, observability::encode_metrics);
    }

    let app = build_router(&cfg)?;
    for upstream in RouteTable::from_config(&cfg).upstreams() {
        info!(prefix = %upstream.prefix, target = %upstream.target, "proxy route");
    }

    let addr = cfg.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, service = SERVICE_NAME, event = "listening", "gateway listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
