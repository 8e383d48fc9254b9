use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, TenantKey};
use crate::state::AppState;
use crate::store::Document;

/// GET / - List every document in the caller's partition
pub async fn get(
    State(state): State<AppState>,
    Extension(key): Extension<TenantKey>,
) -> ApiResult<Vec<Document>> {
    let documents = state.documents(key).list().await?;
    Ok(ApiResponse::success(documents))
}

/// POST / - Create one document (object body) or many (array body)
pub async fn post(
    State(state): State<AppState>,
    Extension(key): Extension<TenantKey>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(payload) = payload?;

    let created = state.documents(key).create(payload).await?;
    Ok(ApiResponse::created(created))
}

/// DELETE / - Delete the caller's whole partition
pub async fn delete(
    State(state): State<AppState>,
    Extension(key): Extension<TenantKey>,
) -> ApiResult<Value> {
    let count = state.documents(key).delete_all().await?;

    Ok(ApiResponse::success(json!({
        "message": "Operation completed successfully.",
        "count": count
    })))
}
