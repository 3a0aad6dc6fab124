use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder,
};

// Prometheus metrics (default registry), labelled by route prefix
pub static PROXY_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "gateway_proxy_requests_total",
        "Total requests forwarded to a backend",
        &["prefix"]
    )
    .expect("register proxy_requests_total")
});

pub static PROXY_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "gateway_proxy_errors_total",
        "Total forwards that failed before a backend response",
        &["prefix"]
    )
    .expect("register proxy_errors_total")
});

pub static PROXY_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "gateway_proxy_request_duration_seconds",
        "Time until the backend response head arrived, in seconds",
        &["prefix"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("register proxy_request_duration")
});

pub fn encode_metrics() -> (axum::http::StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        PROXY_REQUESTS_TOTAL.with_label_values(&["/metrics-test"]).inc();
        let (status, body) = encode_metrics();
        assert_eq!(status, axum::http::StatusCode::OK);
        assert!(body.contains("gateway_proxy_requests_total"));
        assert!(body.contains("prefix=\"/metrics-test\""));
    }
}
