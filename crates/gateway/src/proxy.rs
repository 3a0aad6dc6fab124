//! Reverse proxy for one route-table entry.
//!
//! Method, headers and body are forwarded as-is (minus hop-by-hop headers and
//! `Host`); status, headers and body of the backend response are relayed back
//! unchanged. Network-level failures become a 500 JSON failure for this request
//! only.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::types::Failure;
use configs::GatewayConfig;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::Upstream;
use crate::observability::{PROXY_ERRORS_TOTAL, PROXY_REQUESTS_TOTAL, PROXY_REQUEST_DURATION};

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("invalid upstream response: {0}")]
    Response(#[from] axum::http::Error),
}

#[derive(Clone)]
pub struct ProxyState {
    pub client: reqwest::Client,
    pub upstream: Arc<Upstream>,
}

/// Shared HTTP client with the gateway's timeout policy. Redirects are relayed, not followed.
pub fn build_client(cfg: &GatewayConfig) -> Result<reqwest::Client, ProxyError> {
    Ok(reqwest::Client::builder()
        .connect_timeout(cfg.connect_timeout())
        .timeout(cfg.request_timeout())
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Connection 头里点名的字段同样只对本跳有效
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

pub async fn forward(State(state): State<ProxyState>, req: Request) -> Response {
    let prefix = state.upstream.prefix.as_str();
    PROXY_REQUESTS_TOTAL.with_label_values(&[prefix]).inc();
    let started = Instant::now();

    let result = send_upstream(&state, req).await;
    PROXY_REQUEST_DURATION
        .with_label_values(&[prefix])
        .observe(started.elapsed().as_secs_f64());

    match result {
        Ok(resp) => resp,
        Err(e) => {
            PROXY_ERRORS_TOTAL.with_label_values(&[prefix]).inc();
            error!(prefix, target = %state.upstream.target, error = %e, event = "proxy_error", "proxy error");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(Failure::new(e.to_string()))).into_response()
        }
    }
}

async fn send_upstream(state: &ProxyState, req: Request) -> Result<Response, ProxyError> {
    let (parts, body) = req.into_parts();
    let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = state.upstream.target_url(path_and_query);
    debug!(method = %parts.method, uri = %parts.uri, target_url = %url, "forwarding request");

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);

    let upstream = state
        .client
        .request(parts.method, url)
        .headers(headers)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await?;

    let status = upstream.status();
    let mut resp_headers = upstream.headers().clone();
    strip_hop_by_hop(&mut resp_headers);

    let mut response = Response::builder()
        .status(status)
        .body(Body::from_stream(upstream.bytes_stream()))?;
    *response.headers_mut() = resp_headers;
    Ok(response)
}
