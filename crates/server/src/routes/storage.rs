//! API-2: files in one blob container.

use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use common::types::{Health, NotReady};
use serde::Deserialize;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::{json, Value};
use service::blob_service::StorageService;
use tracing::warn;

use crate::errors::{json_body, JsonApiError};

pub const SERVICE_NAME: &str = "api-2";
const FILE_FIELD: &str = "file";

#[derive(Debug, Default, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub content: String,
}

async fn health() -> Json<Health> {
    Json(Health::healthy(SERVICE_NAME))
}

async fn ready(State(svc): State<StorageService>) -> Response {
    match svc.ready().await {
        Ok(()) => Json(json!({"status": "ready", "storage": "connected"})).into_response(),
        Err(e) => {
            warn!(error = %e, service = SERVICE_NAME, event = "not_ready", "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(NotReady::new(e.to_string()))).into_response()
        }
    }
}

async fn list_files(State(svc): State<StorageService>) -> Result<Json<Value>, JsonApiError> {
    let files = svc.list_files().await?;
    Ok(Json(json!({"success": true, "files": files})))
}

async fn upload(
    State(svc): State<StorageService>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, JsonApiError> {
    let mut multipart = multipart?;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| JsonApiError::new(e.status(), e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        if upload.is_some() {
            return Err(JsonApiError::bad_request("Only one file can be uploaded at a time"));
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| JsonApiError::new(e.status(), e.body_text()))?;
        upload = Some((file_name, content_type, data));
    }

    let (file_name, content_type, data) =
        upload.ok_or_else(|| JsonApiError::bad_request("No file uploaded"))?;
    if file_name.is_empty() {
        return Err(JsonApiError::bad_request("No file uploaded"));
    }
    let stored = svc.upload(&file_name, content_type.as_deref(), data).await?;
    Ok(Json(json!({"success": true, "file": stored})))
}

async fn put_text(
    State(svc): State<StorageService>,
    body: Result<Json<TextContent>, JsonRejection>,
) -> Result<Json<Value>, JsonApiError> {
    let body = json_body(body)?;
    let stored = svc.put_text(&body.filename, &body.content).await?;
    Ok(Json(json!({"success": true, "file": stored})))
}

/// `attachment` disposition with an ASCII fallback name plus the exact
/// UTF-8 name as `filename*`.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(name, NON_ALPHANUMERIC)
    )
}

async fn download(
    State(svc): State<StorageService>,
    Path(name): Path<String>,
) -> Result<Response, JsonApiError> {
    // 下载失败一律按 500 返回，不区分对象是否存在
    let blob = svc
        .download(&name)
        .await
        .map_err(|e| JsonApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let headers = [
        (header::CONTENT_TYPE, blob.content_type),
        (header::CONTENT_LENGTH, blob.size.to_string()),
        (header::CONTENT_DISPOSITION, content_disposition(&blob.name)),
    ];
    Ok((headers, Body::from_stream(blob.body)).into_response())
}

async fn remove(
    State(svc): State<StorageService>,
    Path(name): Path<String>,
) -> Result<Json<Value>, JsonApiError> {
    svc.delete(&name)
        .await
        .map_err(|e| JsonApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(json!({"success": true, "message": format!("Deleted {name}")})))
}

pub fn router(svc: StorageService, upload_limit_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/files", get(list_files))
        .route("/upload", post(upload))
        .route("/content", post(put_text))
        .route("/files/:name", get(download).delete(remove))
        .layer(DefaultBodyLimit::max(upload_limit_bytes))
        .with_state(svc)
}
