use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::types::Failure;
use service::errors::ServiceError;
use thiserror::Error;
use tracing::error;

/// Error body of every JSON endpoint: a status plus `{success: false, error}`.
#[derive(Debug)]
pub struct JsonApiError {
    pub status: StatusCode,
    pub message: String,
}

impl JsonApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<ServiceError> for JsonApiError {
    fn from(e: ServiceError) -> Self {
        let status = match &e {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unavailable(_) | ServiceError::Db(_) | ServiceError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

// 请求体无法解析时同样返回 JSON 失败体，而不是 axum 默认的纯文本
impl From<JsonRejection> for JsonApiError {
    fn from(e: JsonRejection) -> Self {
        Self::bad_request(e.body_text())
    }
}

impl From<MultipartRejection> for JsonApiError {
    fn from(e: MultipartRejection) -> Self {
        Self::bad_request(e.body_text())
    }
}

/// JSON body of a write endpoint. A request without a JSON content type is
/// read as an empty object so the field validation decides the message.
pub fn json_body<T: Default>(body: Result<Json<T>, JsonRejection>) -> Result<T, JsonApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, event = "request_failed", "request failed");
        }
        (self.status, Json(Failure::new(self.message))).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}
