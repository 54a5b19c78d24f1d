use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

use crate::errors::AppError;
use crate::models::PassthroughRequest;
use crate::services::protocol;
use crate::state::AppState;

// POST /beckn/:service/:action
pub async fn passthrough(
    State(state): State<Arc<AppState>>,
    Path((service, action)): Path<(String, String)>,
    payload: Result<Json<PassthroughRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload?;
    let body = protocol::forward(&state, &service, &action, request).await?;
    Ok(Json(body))
}
