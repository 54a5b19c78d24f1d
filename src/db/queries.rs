use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{named_params, params, Connection, OptionalExtension, Row};

use crate::models::{
    Address, AlertKind, Booking, BookingItem, BookingStatus, BookingType, BppBookingMapping,
    BppServiceType, Itinerary, MappingStatsRow, MappingStatus, MappingWithBooking, NewBooking,
    NewMapping, OperatorAlert, Passenger, Payment, PaymentStatus,
};

/// Fixed-width UTC timestamps so text ordering matches time ordering.
pub fn format_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?)
}

fn parse_json(raw: Option<String>) -> anyhow::Result<Option<serde_json::Value>> {
    raw.map(|s| serde_json::from_str(&s)).transpose().map_err(Into::into)
}

fn collect<T>(rows: impl Iterator<Item = rusqlite::Result<anyhow::Result<T>>>) -> anyhow::Result<Vec<T>> {
    let mut out = vec![];
    for row in rows {
        out.push(row??);
    }
    Ok(out)
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &NewBooking, now: &DateTime<Utc>) -> anyhow::Result<i64> {
    let (origin, destination, departure_time, arrival_time, check_in_date, check_out_date) =
        match &booking.itinerary {
            Itinerary::Transport {
                origin,
                destination,
                departure_time,
                arrival_time,
            } => (
                Some(origin.as_str()),
                Some(destination.as_str()),
                Some(format_ts(departure_time)),
                arrival_time.as_ref().map(format_ts),
                None,
                None,
            ),
            Itinerary::Stay {
                check_in_date,
                check_out_date,
            } => (
                None,
                None,
                None,
                None,
                Some(check_in_date.format("%Y-%m-%d").to_string()),
                Some(check_out_date.format("%Y-%m-%d").to_string()),
            ),
        };

    let passenger = &booking.passenger;
    let address = &passenger.address;
    let item_details = booking
        .item
        .item_details
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let booking_metadata = booking
        .booking_metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let date_of_birth = passenger
        .date_of_birth
        .map(|d| d.format("%Y-%m-%d").to_string());
    let now = format_ts(now);

    conn.execute(
        "INSERT INTO bookings (
            booking_reference, transaction_id, user_id, booking_type,
            item_id, provider_id, item_name, item_code,
            origin, destination, departure_time, arrival_time, check_in_date, check_out_date,
            passenger_name, passenger_email, passenger_phone, passenger_gender, date_of_birth,
            nationality, passport_number,
            address_line1, address_line2, city, state, postal_code, country,
            payment_method, payment_status, amount, currency,
            booking_status, beckn_transaction_id, beckn_message_id, order_id,
            item_details, booking_metadata, created_at, updated_at
         ) VALUES (
            :booking_reference, :transaction_id, :user_id, :booking_type,
            :item_id, :provider_id, :item_name, :item_code,
            :origin, :destination, :departure_time, :arrival_time, :check_in_date, :check_out_date,
            :passenger_name, :passenger_email, :passenger_phone, :passenger_gender, :date_of_birth,
            :nationality, :passport_number,
            :address_line1, :address_line2, :city, :state, :postal_code, :country,
            :payment_method, :payment_status, :amount, :currency,
            :booking_status, :beckn_transaction_id, :beckn_message_id, :order_id,
            :item_details, :booking_metadata, :created_at, :updated_at
         )",
        named_params! {
            ":booking_reference": booking.booking_reference,
            ":transaction_id": booking.transaction_id,
            ":user_id": booking.user_id,
            ":booking_type": booking.booking_type.as_str(),
            ":item_id": booking.item.item_id,
            ":provider_id": booking.item.provider_id,
            ":item_name": booking.item.item_name,
            ":item_code": booking.item.item_code,
            ":origin": origin,
            ":destination": destination,
            ":departure_time": departure_time,
            ":arrival_time": arrival_time,
            ":check_in_date": check_in_date,
            ":check_out_date": check_out_date,
            ":passenger_name": passenger.name,
            ":passenger_email": passenger.email,
            ":passenger_phone": passenger.phone,
            ":passenger_gender": passenger.gender,
            ":date_of_birth": date_of_birth,
            ":nationality": passenger.nationality,
            ":passport_number": passenger.passport_number,
            ":address_line1": address.address_line1,
            ":address_line2": address.address_line2,
            ":city": address.city,
            ":state": address.state,
            ":postal_code": address.postal_code,
            ":country": address.country,
            ":payment_method": booking.payment.payment_method,
            ":payment_status": booking.payment.payment_status.as_str(),
            ":amount": booking.payment.amount,
            ":currency": booking.payment.currency,
            ":booking_status": BookingStatus::Confirmed.as_str(),
            ":beckn_transaction_id": booking.beckn_transaction_id,
            ":beckn_message_id": booking.beckn_message_id,
            ":order_id": booking.order_id,
            ":item_details": item_details,
            ":booking_metadata": booking_metadata,
            ":created_at": now,
            ":updated_at": now,
        },
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_booking_by_reference(conn: &Connection, reference: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn
        .query_row(
            "SELECT * FROM bookings WHERE booking_reference = ?1",
            params![reference],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;

    result.transpose()
}

/// Every booking for the email, newest first. No filtering by type or status.
pub fn list_bookings_by_email(conn: &Connection, email: &str) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM bookings WHERE passenger_email = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![email], |row| Ok(parse_booking_row(row)))?;
    collect(rows)
}

/// Compare-and-set on both statuses; returns false if the row moved underneath us.
pub fn update_booking_statuses(
    conn: &Connection,
    reference: &str,
    from: (BookingStatus, PaymentStatus),
    to: (BookingStatus, PaymentStatus),
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET booking_status = ?1, payment_status = ?2, updated_at = ?3
         WHERE booking_reference = ?4 AND booking_status = ?5 AND payment_status = ?6",
        params![
            to.0.as_str(),
            to.1.as_str(),
            format_ts(now),
            reference,
            from.0.as_str(),
            from.1.as_str(),
        ],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &Row) -> anyhow::Result<Booking> {
    let booking_type_str: String = row.get("booking_type")?;
    let booking_type = BookingType::parse(&booking_type_str)
        .ok_or_else(|| anyhow::anyhow!("unknown booking_type in row: {booking_type_str}"))?;

    let itinerary = if booking_type.is_lodging() {
        let check_in: Option<String> = row.get("check_in_date")?;
        let check_out: Option<String> = row.get("check_out_date")?;
        match (check_in, check_out) {
            (Some(check_in), Some(check_out)) => Itinerary::Stay {
                check_in_date: parse_date(&check_in)?,
                check_out_date: parse_date(&check_out)?,
            },
            _ => anyhow::bail!("hotel booking row is missing its stay dates"),
        }
    } else {
        let origin: Option<String> = row.get("origin")?;
        let destination: Option<String> = row.get("destination")?;
        let departure: Option<String> = row.get("departure_time")?;
        let arrival: Option<String> = row.get("arrival_time")?;
        match (origin, destination, departure) {
            (Some(origin), Some(destination), Some(departure)) => Itinerary::Transport {
                origin,
                destination,
                departure_time: parse_ts(&departure)?,
                arrival_time: arrival.as_deref().map(parse_ts).transpose()?,
            },
            _ => anyhow::bail!("{booking_type_str} booking row is missing its route"),
        }
    };

    let status_str: String = row.get("booking_status")?;
    let booking_status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown booking_status in row: {status_str}"))?;
    let payment_str: String = row.get("payment_status")?;
    let payment_status = PaymentStatus::parse(&payment_str)
        .ok_or_else(|| anyhow::anyhow!("unknown payment_status in row: {payment_str}"))?;

    let date_of_birth: Option<String> = row.get("date_of_birth")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Booking {
        id: row.get("id")?,
        details: NewBooking {
            booking_reference: row.get("booking_reference")?,
            transaction_id: row.get("transaction_id")?,
            user_id: row.get("user_id")?,
            booking_type,
            item: BookingItem {
                item_id: row.get("item_id")?,
                provider_id: row.get("provider_id")?,
                item_name: row.get("item_name")?,
                item_code: row.get("item_code")?,
                item_details: parse_json(row.get("item_details")?)?,
            },
            itinerary,
            passenger: Passenger {
                name: row.get("passenger_name")?,
                email: row.get("passenger_email")?,
                phone: row.get("passenger_phone")?,
                gender: row.get("passenger_gender")?,
                date_of_birth: date_of_birth.as_deref().map(parse_date).transpose()?,
                nationality: row.get("nationality")?,
                passport_number: row.get("passport_number")?,
                address: Address {
                    address_line1: row.get("address_line1")?,
                    address_line2: row.get("address_line2")?,
                    city: row.get("city")?,
                    state: row.get("state")?,
                    postal_code: row.get("postal_code")?,
                    country: row.get("country")?,
                },
            },
            payment: Payment {
                payment_method: row.get("payment_method")?,
                payment_status,
                amount: row.get("amount")?,
                currency: row.get("currency")?,
            },
            order_id: row.get("order_id")?,
            beckn_transaction_id: row.get("beckn_transaction_id")?,
            beckn_message_id: row.get("beckn_message_id")?,
            booking_metadata: parse_json(row.get("booking_metadata")?)?,
        },
        booking_status,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

// ── BPP Booking Mappings ──

const MAPPING_COLUMNS: &str = "m.id, m.platform_booking_id, m.platform_booking_reference, \
     m.bpp_service_type, m.bpp_booking_id, m.bpp_service_url, m.beckn_transaction_id, \
     m.beckn_message_id, m.mapping_status, m.created_at, m.updated_at";

/// One row per (platform booking, service); a retry overwrites the BPP id.
pub fn upsert_mapping(conn: &Connection, mapping: &NewMapping, now: &DateTime<Utc>) -> anyhow::Result<()> {
    let now = format_ts(now);
    conn.execute(
        "INSERT INTO bpp_booking_mappings (
            platform_booking_id, platform_booking_reference, bpp_service_type, bpp_booking_id,
            bpp_service_url, beckn_transaction_id, beckn_message_id, mapping_status,
            created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'ACTIVE', ?8, ?8)
         ON CONFLICT(platform_booking_id, bpp_service_type) DO UPDATE SET
           platform_booking_reference = excluded.platform_booking_reference,
           bpp_booking_id = excluded.bpp_booking_id,
           bpp_service_url = COALESCE(excluded.bpp_service_url, bpp_service_url),
           beckn_transaction_id = COALESCE(excluded.beckn_transaction_id, beckn_transaction_id),
           beckn_message_id = COALESCE(excluded.beckn_message_id, beckn_message_id),
           updated_at = excluded.updated_at",
        params![
            mapping.platform_booking_id,
            mapping.platform_booking_reference,
            mapping.bpp_service_type.as_str(),
            mapping.bpp_booking_id,
            mapping.bpp_service_url,
            mapping.beckn_transaction_id,
            mapping.beckn_message_id,
            now,
        ],
    )?;
    Ok(())
}

pub fn find_mapping(
    conn: &Connection,
    platform_booking_id: &str,
    service: BppServiceType,
) -> anyhow::Result<Option<BppBookingMapping>> {
    let result = conn
        .query_row(
            &format!(
                "SELECT {MAPPING_COLUMNS} FROM bpp_booking_mappings m
                 WHERE m.platform_booking_id = ?1 AND m.bpp_service_type = ?2"
            ),
            params![platform_booking_id, service.as_str()],
            |row| Ok(parse_mapping_row(row)),
        )
        .optional()?;

    result.transpose()
}

pub fn mappings_by_platform_id(conn: &Connection, platform_booking_id: &str) -> anyhow::Result<Vec<BppBookingMapping>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MAPPING_COLUMNS} FROM bpp_booking_mappings m
         WHERE m.platform_booking_id = ?1
         ORDER BY m.created_at DESC, m.id DESC"
    ))?;
    let rows = stmt.query_map(params![platform_booking_id], |row| Ok(parse_mapping_row(row)))?;
    collect(rows)
}

pub fn mapping_by_bpp_id(conn: &Connection, bpp_booking_id: &str) -> anyhow::Result<Option<BppBookingMapping>> {
    let result = conn
        .query_row(
            &format!(
                "SELECT {MAPPING_COLUMNS} FROM bpp_booking_mappings m WHERE m.bpp_booking_id = ?1"
            ),
            params![bpp_booking_id],
            |row| Ok(parse_mapping_row(row)),
        )
        .optional()?;

    result.transpose()
}

pub fn mappings_by_reference(conn: &Connection, reference: &str) -> anyhow::Result<Vec<MappingWithBooking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MAPPING_COLUMNS},
                b.booking_type AS b_booking_type,
                b.item_name AS b_item_name,
                b.passenger_name AS b_passenger_name,
                b.amount AS b_amount,
                b.booking_status AS b_booking_status
         FROM bpp_booking_mappings m
         LEFT JOIN bookings b ON m.platform_booking_reference = b.booking_reference
         WHERE m.platform_booking_reference = ?1
         ORDER BY m.created_at DESC, m.id DESC"
    ))?;

    let rows = stmt.query_map(params![reference], |row| Ok(parse_mapping_with_booking_row(row)))?;
    collect(rows)
}

pub fn update_mapping_status(
    conn: &Connection,
    bpp_booking_id: &str,
    from: MappingStatus,
    to: MappingStatus,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bpp_booking_mappings SET mapping_status = ?1, updated_at = ?2
         WHERE bpp_booking_id = ?3 AND mapping_status = ?4",
        params![to.as_str(), format_ts(now), bpp_booking_id, from.as_str()],
    )?;
    Ok(count > 0)
}

pub fn mapping_stats_rows(conn: &Connection) -> anyhow::Result<Vec<MappingStatsRow>> {
    let mut stmt = conn.prepare(
        "SELECT bpp_service_type, mapping_status, COUNT(*)
         FROM bpp_booking_mappings
         GROUP BY bpp_service_type, mapping_status
         ORDER BY bpp_service_type, mapping_status",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(MappingStatsRow {
            bpp_service_type: row.get(0)?,
            mapping_status: row.get(1)?,
            count: row.get(2)?,
        })
    })?;

    let mut stats = vec![];
    for row in rows {
        stats.push(row?);
    }
    Ok(stats)
}

fn parse_mapping_with_booking_row(row: &Row) -> anyhow::Result<MappingWithBooking> {
    let booking_type: Option<String> = row.get("b_booking_type")?;
    let booking_status: Option<String> = row.get("b_booking_status")?;

    Ok(MappingWithBooking {
        mapping: parse_mapping_row(row)?,
        booking_type: booking_type.as_deref().and_then(BookingType::parse),
        item_name: row.get("b_item_name")?,
        passenger_name: row.get("b_passenger_name")?,
        amount: row.get("b_amount")?,
        booking_status: booking_status.as_deref().and_then(BookingStatus::parse),
    })
}

fn parse_mapping_row(row: &Row) -> anyhow::Result<BppBookingMapping> {
    let service_str: String = row.get("bpp_service_type")?;
    let status_str: String = row.get("mapping_status")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(BppBookingMapping {
        id: row.get("id")?,
        platform_booking_id: row.get("platform_booking_id")?,
        platform_booking_reference: row.get("platform_booking_reference")?,
        bpp_service_type: BppServiceType::parse(&service_str)
            .ok_or_else(|| anyhow::anyhow!("unknown bpp_service_type in row: {service_str}"))?,
        bpp_booking_id: row.get("bpp_booking_id")?,
        bpp_service_url: row.get("bpp_service_url")?,
        beckn_transaction_id: row.get("beckn_transaction_id")?,
        beckn_message_id: row.get("beckn_message_id")?,
        mapping_status: MappingStatus::parse(&status_str)
            .ok_or_else(|| anyhow::anyhow!("unknown mapping_status in row: {status_str}"))?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

// ── Operator Alerts ──

pub fn insert_alert(
    conn: &Connection,
    kind: AlertKind,
    booking_reference: &str,
    service: Option<BppServiceType>,
    detail: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO operator_alerts (kind, booking_reference, service, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            kind.as_str(),
            booking_reference,
            service.map(|s| s.as_str()),
            detail,
            format_ts(now),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn recent_alerts(conn: &Connection, limit: i64) -> anyhow::Result<Vec<OperatorAlert>> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, booking_reference, service, detail, created_at
         FROM operator_alerts ORDER BY created_at DESC, id DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], |row| Ok(parse_alert_row(row)))?;
    collect(rows)
}

fn parse_alert_row(row: &Row) -> anyhow::Result<OperatorAlert> {
    let kind: String = row.get("kind")?;
    let service: Option<String> = row.get("service")?;
    let created_at: String = row.get("created_at")?;

    Ok(OperatorAlert {
        id: row.get("id")?,
        kind: AlertKind::parse(&kind)
            .ok_or_else(|| anyhow::anyhow!("unknown alert kind in row: {kind}"))?,
        booking_reference: row.get("booking_reference")?,
        service: service.as_deref().and_then(BppServiceType::parse),
        detail: row.get("detail")?,
        created_at: parse_ts(&created_at)?,
    })
}
