use std::io;
use tracing_subscriber::{fmt, EnvFilter};

fn filter_or(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Initialize tracing subscriber with compact, human readable output.
/// - Respects `RUST_LOG` if set
/// - Falls back to `info,tower_http=info,axum=info`
/// - Writes to stdout so container runtimes pick it up with the request logs
pub fn init_logging_default() {
    let _ = fmt()
        .with_env_filter(filter_or("info,tower_http=info,axum=info"))
        .with_target(false)
        .compact()
        .with_writer(io::stdout)
        .try_init();
}

/// Initialize tracing subscriber with JSON structured output.
/// `default_directives` applies only when `RUST_LOG` is unset,
/// e.g. `info,gateway::proxy=debug` to see every forwarded request.
pub fn init_logging_json(default_directives: &str) {
    let _ = fmt()
        .with_env_filter(filter_or(default_directives))
        .with_target(true)
        .json()
        .with_writer(io::stdout)
        .try_init();
}

/// Pick the output format from `LOG_FORMAT` (`json` or anything else for compact).
pub fn init_logging_from_env(json_directives: &str) {
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => init_logging_json(json_directives),
        _ => init_logging_default(),
    }
}
