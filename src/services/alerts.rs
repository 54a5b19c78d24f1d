use chrono::Utc;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{AlertKind, BppServiceType, OperatorAlert};
use crate::state::AppState;

pub const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

/// Queues an alert for an operator. Failing to queue is logged and
/// swallowed; the caller's own outcome must not depend on it.
pub fn raise(
    conn: &Connection,
    kind: AlertKind,
    booking_reference: &str,
    service: Option<BppServiceType>,
    detail: &str,
) {
    tracing::error!(
        kind = kind.as_str(),
        booking_reference = %booking_reference,
        service = service.map(|s| s.as_str()),
        detail = %detail,
        "operator alert"
    );

    if let Err(e) = queries::insert_alert(conn, kind, booking_reference, service, detail, &Utc::now()) {
        tracing::error!(error = %e, kind = kind.as_str(), "failed to persist operator alert");
    }
}

/// `raise` for async callers that do not hold the connection.
pub fn notify(
    state: &AppState,
    kind: AlertKind,
    booking_reference: &str,
    service: Option<BppServiceType>,
    detail: &str,
) {
    match state.conn() {
        Ok(conn) => raise(&conn, kind, booking_reference, service, detail),
        Err(e) => tracing::error!(
            error = %e,
            kind = kind.as_str(),
            booking_reference = %booking_reference,
            detail = %detail,
            "operator alert dropped"
        ),
    }
}

pub fn recent(conn: &Connection, limit: Option<i64>) -> Result<Vec<OperatorAlert>, AppError> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    if limit < 1 {
        return Err(AppError::Validation("limit must be positive".to_string()));
    }
    Ok(queries::recent_alerts(conn, limit.min(MAX_LIMIT))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_raise_then_list_newest_first() {
        let conn = db::init_db(":memory:").unwrap();
        raise(&conn, AlertKind::MappingFailed, "BK001", Some(BppServiceType::Flights), "first");
        raise(&conn, AlertKind::CancelUpstreamRejected, "BK002", None, "second");

        let alerts = recent(&conn, None).unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].detail, "second");
        assert_eq!(alerts[0].service, None);
        assert_eq!(alerts[1].kind, AlertKind::MappingFailed);
        assert_eq!(alerts[1].service, Some(BppServiceType::Flights));

        assert_eq!(recent(&conn, Some(1)).unwrap().len(), 1);
        assert!(matches!(recent(&conn, Some(0)), Err(AppError::Validation(_))));
    }
}
