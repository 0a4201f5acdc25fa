//! Access key administration endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::api::state::DirectoryState;
use crate::api::types::{ApiError, Json};
use crate::domain::access_key::{
    validate_create_request, validate_list_query, validate_update_request, AccessKey,
    AccessKeyPage, ListAccessKeysQuery,
};
use crate::infrastructure::auth::OperatorClaims;

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /access-keys
pub async fn create_access_key(
    State(state): State<DirectoryState>,
    Extension(operator): Extension<OperatorClaims>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<AccessKey>), ApiError> {
    let command = validate_create_request(&body)?;
    let access_key = state.directory.create(command).await?;

    info!(
        "Access key created: operator={}, user_id={}",
        operator.operator_id(),
        access_key.user_id()
    );

    Ok((StatusCode::CREATED, Json(access_key)))
}

/// PUT /access-keys/{key}
pub async fn update_access_key(
    State(state): State<DirectoryState>,
    Extension(operator): Extension<OperatorClaims>,
    Path(key): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<AccessKey>, ApiError> {
    let patch = validate_update_request(&body)?;
    let access_key = state.directory.update(&key, patch).await?;

    info!("Access key updated: operator={}", operator.operator_id());

    Ok(Json(access_key))
}

/// DELETE /access-keys/{key}
pub async fn delete_access_key(
    State(state): State<DirectoryState>,
    Extension(operator): Extension<OperatorClaims>,
    Path(key): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.directory.delete(&key).await?;

    info!("Access key deleted: operator={}", operator.operator_id());

    Ok(Json(MessageResponse {
        message: "Access key deleted successfully".to_string(),
    }))
}

/// GET /access-keys/{key}
pub async fn get_access_key(
    State(state): State<DirectoryState>,
    Path(key): Path<String>,
) -> Result<Json<AccessKey>, ApiError> {
    Ok(Json(state.directory.get(&key).await?))
}

/// GET /access-keys
pub async fn list_access_keys(
    State(state): State<DirectoryState>,
    Query(query): Query<ListAccessKeysQuery>,
) -> Result<Json<AccessKeyPage>, ApiError> {
    let filter = validate_list_query(&query)?;
    let page = state.directory.find(&filter).await?;

    debug!(
        "Listed access keys: returned={}, count={}",
        page.access_keys.len(),
        page.count
    );

    Ok(Json(page))
}
