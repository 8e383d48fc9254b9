use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, TenantKey};
use crate::state::AppState;
use crate::store::Document;

/// GET /:id - Get a single document from the caller's partition
pub async fn get(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(key): Extension<TenantKey>,
) -> ApiResult<Document> {
    let document = state.documents(key).get(&id).await?;
    Ok(ApiResponse::success(document))
}

/// PUT /:id - Merge the body's fields into an existing document
pub async fn put(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(key): Extension<TenantKey>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Document> {
    let Json(payload) = payload?;

    let applied = state.documents(key).update(&id, payload).await?;
    Ok(ApiResponse::success(applied))
}

/// DELETE /:id - Delete a single document from the caller's partition
pub async fn delete(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(key): Extension<TenantKey>,
) -> ApiResult<Value> {
    state.documents(key).delete(&id).await?;

    Ok(ApiResponse::success(json!({
        "message": "Operation completed successfully."
    })))
}
