use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{BppBookingMapping, MappingStats, MappingStatus, MappingWithBooking, RecordMappingRequest};
use crate::services::mappings;
use crate::state::AppState;

// POST /api/bpp-mappings
pub async fn record_mapping(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RecordMappingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BppBookingMapping>), AppError> {
    let Json(request) = payload?;
    let new = request.validate()?;

    let db = state.conn()?;
    let mapping = mappings::record(&db, &new)?;
    Ok((StatusCode::CREATED, Json(mapping)))
}

#[derive(Serialize)]
pub struct PlatformMappings {
    platform_booking_id: String,
    mapping_count: usize,
    mappings: Vec<BppBookingMapping>,
}

// GET /api/bpp-mappings/platform/:id
pub async fn by_platform_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PlatformMappings>, AppError> {
    let mappings = {
        let db = state.conn()?;
        mappings::by_platform_id(&db, &id)?
    };

    Ok(Json(PlatformMappings {
        platform_booking_id: id,
        mapping_count: mappings.len(),
        mappings,
    }))
}

// GET /api/bpp-mappings/bpp/:id
pub async fn by_bpp_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BppBookingMapping>, AppError> {
    let db = state.conn()?;
    Ok(Json(mappings::by_bpp_id(&db, &id)?))
}

#[derive(Serialize)]
pub struct ReferenceMappings {
    booking_reference: String,
    mapping_count: usize,
    mappings: Vec<MappingWithBooking>,
}

// GET /api/bpp-mappings/reference/:reference
pub async fn by_reference(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<Json<ReferenceMappings>, AppError> {
    let mappings = {
        let db = state.conn()?;
        mappings::by_reference(&db, &reference)?
    };

    Ok(Json(ReferenceMappings {
        booking_reference: reference,
        mapping_count: mappings.len(),
        mappings,
    }))
}

#[derive(Deserialize)]
pub struct MappingStatusUpdate {
    pub status: String,
}

// PATCH /api/bpp-mappings/bpp/:id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<MappingStatusUpdate>, JsonRejection>,
) -> Result<Json<BppBookingMapping>, AppError> {
    let Json(update) = payload?;
    let status = MappingStatus::parse(&update.status)
        .ok_or_else(|| AppError::Validation(format!("unknown mapping status '{}'", update.status)))?;

    let db = state.conn()?;
    Ok(Json(mappings::update_status(&db, &id, status)?))
}

// GET /api/bpp-mappings/stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<MappingStats>, AppError> {
    let db = state.conn()?;
    Ok(Json(mappings::stats(&db)?))
}
