use chrono::Utc;
use rusqlite::Connection;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, NewBooking, PaymentStatus, Transition};

/// Persists a validated booking as CONFIRMED. Duplicate reference or
/// transaction id is a conflict; the caller must not retry with the same values.
pub fn create(conn: &Connection, booking: &NewBooking) -> Result<Booking, AppError> {
    let now = Utc::now();

    match queries::insert_booking(conn, booking, &now) {
        Ok(id) => {
            tracing::info!(
                id,
                booking_reference = %booking.booking_reference,
                booking_type = booking.booking_type.as_str(),
                "booking created"
            );
        }
        Err(e) => {
            if let Some(constraint) = db::unique_violation(&e) {
                let field = if constraint.contains("transaction_id") {
                    format!("transaction_id '{}'", booking.transaction_id)
                } else {
                    format!("booking_reference '{}'", booking.booking_reference)
                };
                tracing::warn!(booking_reference = %booking.booking_reference, "duplicate booking rejected");
                return Err(AppError::Conflict(format!("{field} is already in use")));
            }
            return Err(e.into());
        }
    }

    get_by_reference(conn, &booking.booking_reference)
}

pub fn get_by_reference(conn: &Connection, reference: &str) -> Result<Booking, AppError> {
    queries::find_booking_by_reference(conn, reference)?
        .ok_or_else(|| AppError::NotFound(format!("booking {reference}")))
}

pub fn list_by_email(conn: &Connection, email: &str) -> Result<Vec<Booking>, AppError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation("email is required".to_string()));
    }
    Ok(queries::list_bookings_by_email(conn, &email)?)
}

/// Moves a booking to CANCELLED. Cancelling twice is a no-op; cancelling a
/// COMPLETED booking is a conflict.
pub fn cancel(conn: &Connection, reference: &str) -> Result<Booking, AppError> {
    update_status(conn, reference, Some(BookingStatus::Cancelled), None)
}

pub fn update_status(
    conn: &Connection,
    reference: &str,
    booking_status: Option<BookingStatus>,
    payment_status: Option<PaymentStatus>,
) -> Result<Booking, AppError> {
    if booking_status.is_none() && payment_status.is_none() {
        return Err(AppError::Validation(
            "booking_status or payment_status is required".to_string(),
        ));
    }

    // A lost compare-and-set means another request moved the row first;
    // re-read once and judge the transition against the new state.
    for _ in 0..2 {
        let current = get_by_reference(conn, reference)?;
        let from = (current.booking_status, current.details.payment.payment_status);
        let to = (booking_status.unwrap_or(from.0), payment_status.unwrap_or(from.1));

        let booking_move = from.0.transition_to(to.0)?;
        let payment_move = from.1.transition_to(to.1)?;
        if booking_move == Transition::Unchanged && payment_move == Transition::Unchanged {
            return Ok(current);
        }

        if queries::update_booking_statuses(conn, reference, from, to, &Utc::now())? {
            tracing::info!(
                booking_reference = %reference,
                booking_status = to.0.as_str(),
                payment_status = to.1.as_str(),
                "booking status updated"
            );
            return get_by_reference(conn, reference);
        }
    }

    Err(AppError::Conflict(format!(
        "booking {reference} changed concurrently, retry"
    )))
}
