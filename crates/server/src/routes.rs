pub mod relational;
pub mod storage;

use axum::Router;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Layers shared by both backends: permissive CORS and per-request tracing.
pub fn with_common_layers(router: Router) -> Router {
    router.layer(CorsLayer::very_permissive()).layer(
        TraceLayer::new_for_http()
            // 每次请求创建 span，包含方法和路径
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            // 响应返回时记录状态码与耗时
            .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
            .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
    )
}
