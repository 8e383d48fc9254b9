use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, TenantKey};
use crate::state::AppState;
use crate::store::Document;

/// `/me` shadows `/:id` for every method, so writes to it are treated as a
/// document id that can never exist.
const ME_ID: &str = "me";

/// GET /me - static information about how the key partitions data
pub async fn me(Extension(key): Extension<TenantKey>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "welcome": "Hello! You are accessing a key-scoped document backend for frontend development.",
        "authorization": format!("The authorization key you are using is '{}'.", key),
        "message": "Every request you make stores its data in a space exclusive to this authorization key.",
        "warning": "Data stored by this application has a limited lifetime, so use this space for development only.",
    })))
}

/// PUT /me - same as PUT /:id with the id "me"
pub async fn put(
    State(state): State<AppState>,
    Extension(key): Extension<TenantKey>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Document> {
    let Json(payload) = payload?;

    let applied = state.documents(key).update(ME_ID, payload).await?;
    Ok(ApiResponse::success(applied))
}

/// DELETE /me - same as DELETE /:id with the id "me"
pub async fn delete(
    State(state): State<AppState>,
    Extension(key): Extension<TenantKey>,
) -> ApiResult<Value> {
    state.documents(key).delete(ME_ID).await?;

    Ok(ApiResponse::success(json!({
        "message": "Operation completed successfully."
    })))
}
