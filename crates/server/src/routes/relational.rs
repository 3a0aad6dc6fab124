//! API-1: key/value records in `sample_data`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use common::types::{Health, NotReady};
use serde::Deserialize;
use serde_json::{json, Value};
use service::relational::RelationalService;
use tracing::warn;

use crate::errors::{json_body, JsonApiError};

pub const SERVICE_NAME: &str = "api-1";

#[derive(Debug, Default, Deserialize)]
pub struct NewEntry {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

async fn health() -> Json<Health> {
    Json(Health::healthy(SERVICE_NAME))
}

async fn ready(State(svc): State<RelationalService>) -> Response {
    match svc.ready().await {
        Ok(()) => Json(json!({"status": "ready", "database": "connected"})).into_response(),
        Err(e) => {
            warn!(error = %e, service = SERVICE_NAME, event = "not_ready", "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(NotReady::new(e.to_string()))).into_response()
        }
    }
}

async fn init(State(svc): State<RelationalService>) -> Result<Json<Value>, JsonApiError> {
    svc.init_table().await?;
    Ok(Json(json!({"success": true, "message": "Database initialized"})))
}

async fn probe(State(svc): State<RelationalService>) -> Result<Json<Value>, JsonApiError> {
    let probe = svc.probe().await?;
    Ok(Json(json!({"success": true, "data": [probe]})))
}

async fn insert(
    State(svc): State<RelationalService>,
    body: Result<Json<NewEntry>, JsonRejection>,
) -> Result<Json<Value>, JsonApiError> {
    let body = json_body(body)?;
    let record = svc.insert(&body.key, &body.value).await?;
    Ok(Json(json!({"success": true, "data": record})))
}

async fn items(State(svc): State<RelationalService>) -> Result<Json<Value>, JsonApiError> {
    let rows = svc.list().await?;
    Ok(Json(json!({"success": true, "data": rows})))
}

async fn remove(
    State(svc): State<RelationalService>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, JsonApiError> {
    let id: i32 = raw_id
        .parse()
        .map_err(|_| JsonApiError::bad_request(format!("Invalid id: {raw_id}")))?;
    svc.delete(id).await?;
    Ok(Json(json!({"success": true, "message": format!("Deleted record {id}")})))
}

pub fn router(svc: RelationalService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/init", post(init))
        .route("/data", get(probe).post(insert))
        .route("/items", get(items))
        .route("/data/:id", delete(remove))
        .with_state(svc)
}
