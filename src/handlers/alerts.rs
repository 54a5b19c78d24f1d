use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::OperatorAlert;
use crate::services::alerts;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<i64>,
}

// GET /api/alerts
pub async fn recent_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Vec<OperatorAlert>>, AppError> {
    let db = state.conn()?;
    Ok(Json(alerts::recent(&db, query.limit)?))
}
