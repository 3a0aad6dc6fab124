//! Environment/runtime helpers
//!
//! Sanity checks run once at startup, before any listener is bound.

use std::path::Path;

use tracing::warn;

/// Warn when the static asset tree or its entry document is missing.
/// The gateway still starts; unmatched paths will 404 instead of serving the SPA.
pub async fn check_static_dir(static_dir: &Path, index_file: &str) -> bool {
    if tokio::fs::metadata(static_dir).await.is_err() {
        warn!(static_dir = %static_dir.display(), "static assets directory not found; assets will 404");
        return false;
    }
    let index = static_dir.join(index_file);
    if tokio::fs::metadata(&index).await.is_err() {
        warn!(index = %index.display(), "SPA entry document not found; deep links will 404");
        return false;
    }
    true
}
