use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, CreateBookingRequest, PaymentStatus};
use crate::services::bookings;
use crate::services::protocol::{self, CancelOutcome, CancelRequest, ConfirmOutcome, ConfirmRequest};
use crate::state::AppState;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let Json(request) = payload?;
    let new = request.validate()?;

    let booking = {
        let db = state.conn()?;
        bookings::create(&db, &new)?
    };

    Ok((StatusCode::CREATED, Json(booking)))
}

// POST /api/bookings/confirm
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ConfirmOutcome>), AppError> {
    let Json(request) = payload?;
    let outcome = protocol::confirm(&state, request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// GET /api/bookings/reference/:reference
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let db = state.conn()?;
    Ok(Json(bookings::get_by_reference(&db, &reference)?))
}

#[derive(Serialize)]
pub struct BookingList {
    count: usize,
    bookings: Vec<Booking>,
}

// GET /api/bookings/email/:email
pub async fn list_by_email(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<BookingList>, AppError> {
    let bookings = {
        let db = state.conn()?;
        bookings::list_by_email(&db, &email)?
    };

    Ok(Json(BookingList {
        count: bookings.len(),
        bookings,
    }))
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub booking_status: Option<String>,
    pub payment_status: Option<String>,
}

// PATCH /api/bookings/:reference/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    let Json(update) = payload?;

    let booking_status = update
        .booking_status
        .map(|s| {
            BookingStatus::parse(&s)
                .ok_or_else(|| AppError::Validation(format!("unknown booking_status '{s}'")))
        })
        .transpose()?;
    let payment_status = update
        .payment_status
        .map(|s| {
            PaymentStatus::parse(&s)
                .ok_or_else(|| AppError::Validation(format!("unknown payment_status '{s}'")))
        })
        .transpose()?;

    let db = state.conn()?;
    Ok(Json(bookings::update_status(
        &db,
        &reference,
        booking_status,
        payment_status,
    )?))
}

// PATCH /api/bookings/:reference/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
    payload: Option<Json<CancelRequest>>,
) -> Result<Json<CancelOutcome>, AppError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let outcome = protocol::cancel(&state, &reference, request).await?;
    Ok(Json(outcome))
}
