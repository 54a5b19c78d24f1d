use chrono::Utc;
use rusqlite::Connection;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{
    BppBookingMapping, MappingStats, MappingStatus, MappingWithBooking, NewMapping, Transition,
};

/// Records the BPP's id for a platform booking. Re-recording the same
/// (booking, service) pair overwrites the BPP id instead of adding a row.
pub fn record(conn: &Connection, mapping: &NewMapping) -> Result<BppBookingMapping, AppError> {
    if let Err(e) = queries::upsert_mapping(conn, mapping, &Utc::now()) {
        if db::unique_violation(&e).is_some() {
            return Err(AppError::Conflict(format!(
                "bpp_booking_id '{}' is already mapped to another booking",
                mapping.bpp_booking_id
            )));
        }
        return Err(e.into());
    }

    tracing::info!(
        platform_booking_id = %mapping.platform_booking_id,
        service = mapping.bpp_service_type.as_str(),
        bpp_booking_id = %mapping.bpp_booking_id,
        "bpp mapping recorded"
    );

    queries::find_mapping(conn, &mapping.platform_booking_id, mapping.bpp_service_type)?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("mapping vanished after upsert")))
}

pub fn by_platform_id(
    conn: &Connection,
    platform_booking_id: &str,
) -> Result<Vec<BppBookingMapping>, AppError> {
    Ok(queries::mappings_by_platform_id(conn, platform_booking_id)?)
}

pub fn by_bpp_id(conn: &Connection, bpp_booking_id: &str) -> Result<BppBookingMapping, AppError> {
    queries::mapping_by_bpp_id(conn, bpp_booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("bpp booking {bpp_booking_id}")))
}

pub fn by_reference(conn: &Connection, reference: &str) -> Result<Vec<MappingWithBooking>, AppError> {
    Ok(queries::mappings_by_reference(conn, reference)?)
}

pub fn update_status(
    conn: &Connection,
    bpp_booking_id: &str,
    status: MappingStatus,
) -> Result<BppBookingMapping, AppError> {
    for _ in 0..2 {
        let current = by_bpp_id(conn, bpp_booking_id)?;
        if current.mapping_status.transition_to(status)? == Transition::Unchanged {
            return Ok(current);
        }

        if queries::update_mapping_status(conn, bpp_booking_id, current.mapping_status, status, &Utc::now())? {
            tracing::info!(
                bpp_booking_id = %bpp_booking_id,
                mapping_status = status.as_str(),
                "bpp mapping status updated"
            );
            return by_bpp_id(conn, bpp_booking_id);
        }
    }

    Err(AppError::Conflict(format!(
        "mapping {bpp_booking_id} changed concurrently, retry"
    )))
}

pub fn stats(conn: &Connection) -> Result<MappingStats, AppError> {
    Ok(MappingStats::from_rows(queries::mapping_stats_rows(conn)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::flight_request;
    use crate::models::BppServiceType;
    use crate::services::bookings;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn flight_mapping(platform_id: &str, bpp_id: &str) -> NewMapping {
        NewMapping {
            platform_booking_id: platform_id.to_string(),
            platform_booking_reference: platform_id.to_string(),
            bpp_service_type: BppServiceType::Flights,
            bpp_booking_id: bpp_id.to_string(),
            bpp_service_url: Some("http://localhost:7001".to_string()),
            beckn_transaction_id: Some("TXN001".to_string()),
            beckn_message_id: None,
        }
    }

    #[test]
    fn test_record_then_lookup_both_directions() {
        let conn = setup_db();
        let mapping = record(&conn, &flight_mapping("BK001", "FLT-9")).unwrap();
        assert_eq!(mapping.mapping_status, MappingStatus::Active);

        let by_platform = by_platform_id(&conn, "BK001").unwrap();
        assert_eq!(by_platform, vec![mapping.clone()]);
        assert_eq!(by_bpp_id(&conn, "FLT-9").unwrap(), mapping);
    }

    #[test]
    fn test_record_twice_keeps_one_row() {
        let conn = setup_db();
        record(&conn, &flight_mapping("BK001", "FLT-9")).unwrap();

        let mut retry = flight_mapping("BK001", "FLT-10");
        retry.bpp_service_url = None;
        let updated = record(&conn, &retry).unwrap();

        assert_eq!(updated.bpp_booking_id, "FLT-10");
        // Missing url on retry keeps the stored one.
        assert_eq!(updated.bpp_service_url.as_deref(), Some("http://localhost:7001"));
        assert_eq!(by_platform_id(&conn, "BK001").unwrap().len(), 1);
        assert!(matches!(by_bpp_id(&conn, "FLT-9"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_same_bpp_id_on_other_booking_conflicts() {
        let conn = setup_db();
        record(&conn, &flight_mapping("BK001", "FLT-9")).unwrap();
        let err = record(&conn, &flight_mapping("BK002", "FLT-9")).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_unknown_ids_are_empty_or_not_found() {
        let conn = setup_db();
        assert!(by_platform_id(&conn, "NOPE").unwrap().is_empty());
        assert!(by_reference(&conn, "NOPE").unwrap().is_empty());
        assert!(matches!(by_bpp_id(&conn, "NOPE"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_by_reference_joins_booking_summary() {
        let conn = setup_db();
        let booking = flight_request("BK001", "TXN001").validate().unwrap();
        bookings::create(&conn, &booking).unwrap();
        record(&conn, &flight_mapping("BK001", "FLT-9")).unwrap();

        let rows = by_reference(&conn, "BK001").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item_name.as_deref(), Some("IndiGo"));
        assert_eq!(rows[0].passenger_name.as_deref(), Some("Asha Rao"));
        assert_eq!(rows[0].amount, Some(5000.0));
    }

    #[test]
    fn test_by_reference_without_booking_has_empty_summary() {
        let conn = setup_db();
        record(&conn, &flight_mapping("BK404", "FLT-1")).unwrap();

        let rows = by_reference(&conn, "BK404").unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].booking_status.is_none());
    }

    #[test]
    fn test_update_status_rules() {
        let conn = setup_db();
        record(&conn, &flight_mapping("BK001", "FLT-9")).unwrap();

        let cancelled = update_status(&conn, "FLT-9", MappingStatus::Cancelled).unwrap();
        assert_eq!(cancelled.mapping_status, MappingStatus::Cancelled);

        let again = update_status(&conn, "FLT-9", MappingStatus::Cancelled).unwrap();
        assert_eq!(again.updated_at, cancelled.updated_at);

        assert!(matches!(
            update_status(&conn, "FLT-9", MappingStatus::Active),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            update_status(&conn, "NOPE", MappingStatus::Cancelled),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_upsert_does_not_revive_cancelled_mapping() {
        let conn = setup_db();
        record(&conn, &flight_mapping("BK001", "FLT-9")).unwrap();
        update_status(&conn, "FLT-9", MappingStatus::Cancelled).unwrap();

        let again = record(&conn, &flight_mapping("BK001", "FLT-9")).unwrap();
        assert_eq!(again.mapping_status, MappingStatus::Cancelled);
    }

    #[test]
    fn test_stats_counts_by_service_and_status() {
        let conn = setup_db();
        record(&conn, &flight_mapping("BK001", "FLT-1")).unwrap();
        record(&conn, &flight_mapping("BK002", "FLT-2")).unwrap();
        let mut hotel = flight_mapping("BK003", "HTL-1");
        hotel.bpp_service_type = BppServiceType::Hotels;
        record(&conn, &hotel).unwrap();
        update_status(&conn, "FLT-2", MappingStatus::Cancelled).unwrap();

        let stats = stats(&conn).unwrap();
        assert_eq!(stats.total_mappings, 3);
        assert_eq!(stats.by_service_type["flights"]["ACTIVE"], 1);
        assert_eq!(stats.by_service_type["flights"]["CANCELLED"], 1);
        assert_eq!(stats.by_status["ACTIVE"], 2);
    }
}
