//! Blob metadata and the durable object naming convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// Content type used when none was stored and none can be guessed.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// One entry of a container listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobObject {
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
}

/// What an upload returns to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlob {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub content_type: Option<String>,
    pub url: String,
}

/// Durable object key: `<millisecond-timestamp>-<original-name>`.
///
/// Only the last path component of `original` is kept so a client-supplied
/// path never turns into nested object keys.
pub fn object_name(original: &str, created_at: DateTime<Utc>) -> Result<String, ModelError> {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() {
        return Err(ModelError::Validation("file name required".into()));
    }
    if base.chars().any(char::is_control) {
        return Err(ModelError::Validation("file name contains control characters".into()));
    }
    Ok(format!("{}-{}", created_at.timestamp_millis(), base))
}
