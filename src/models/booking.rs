use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::transition::{InvalidTransition, Transition};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingType {
    Flight,
    Hotel,
    Bus,
    Train,
}

impl BookingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingType::Flight => "flight",
            BookingType::Hotel => "hotel",
            BookingType::Bus => "bus",
            BookingType::Train => "train",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flight" => Some(BookingType::Flight),
            "hotel" => Some(BookingType::Hotel),
            "bus" => Some(BookingType::Bus),
            "train" => Some(BookingType::Train),
            _ => None,
        }
    }

    pub fn is_lodging(&self) -> bool {
        matches!(self, BookingType::Hotel)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            "COMPLETED" => Some(BookingStatus::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Confirmed)
    }

    /// CONFIRMED may move to CANCELLED or COMPLETED; both are terminal.
    pub fn transition_to(&self, next: BookingStatus) -> Result<Transition, InvalidTransition> {
        if *self == next {
            return Ok(Transition::Unchanged);
        }
        match (self, next) {
            (BookingStatus::Confirmed, BookingStatus::Cancelled)
            | (BookingStatus::Confirmed, BookingStatus::Completed) => Ok(Transition::Applied),
            _ => Err(InvalidTransition {
                from: self.as_str(),
                to: next.as_str(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PAID" => Some(PaymentStatus::Paid),
            "PENDING" => Some(PaymentStatus::Pending),
            "FAILED" => Some(PaymentStatus::Failed),
            "REFUNDED" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    pub fn transition_to(&self, next: PaymentStatus) -> Result<Transition, InvalidTransition> {
        if *self == next {
            return Ok(Transition::Unchanged);
        }
        match (self, next) {
            (PaymentStatus::Pending, PaymentStatus::Paid)
            | (PaymentStatus::Pending, PaymentStatus::Failed)
            | (PaymentStatus::Failed, PaymentStatus::Pending)
            | (PaymentStatus::Paid, PaymentStatus::Refunded) => Ok(Transition::Applied),
            _ => Err(InvalidTransition {
                from: self.as_str(),
                to: next.as_str(),
            }),
        }
    }
}

/// Itinerary shape, keyed by booking type: transport for flight/bus/train, stay for hotel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Itinerary {
    Transport {
        origin: String,
        destination: String,
        departure_time: DateTime<Utc>,
        arrival_time: Option<DateTime<Utc>>,
    },
    Stay {
        check_in_date: NaiveDate,
        check_out_date: NaiveDate,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingItem {
    pub item_id: String,
    pub provider_id: Option<String>,
    pub item_name: String,
    pub item_code: Option<String>,
    pub item_details: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passenger {
    #[serde(rename = "passenger_name")]
    pub name: String,
    #[serde(rename = "passenger_email")]
    pub email: String,
    #[serde(rename = "passenger_phone")]
    pub phone: String,
    #[serde(rename = "passenger_gender")]
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub passport_number: Option<String>,
    #[serde(flatten)]
    pub address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub payment_method: Option<String>,
    pub payment_status: PaymentStatus,
    pub amount: f64,
    pub currency: String,
}

/// A validated booking ready to be persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewBooking {
    pub booking_reference: String,
    pub transaction_id: String,
    pub user_id: Option<String>,
    pub booking_type: BookingType,
    #[serde(flatten)]
    pub item: BookingItem,
    #[serde(flatten)]
    pub itinerary: Itinerary,
    #[serde(flatten)]
    pub passenger: Passenger,
    #[serde(flatten)]
    pub payment: Payment,
    pub order_id: String,
    pub beckn_transaction_id: Option<String>,
    pub beckn_message_id: Option<String>,
    pub booking_metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: i64,
    #[serde(flatten)]
    pub details: NewBooking,
    pub booking_status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn reference(&self) -> &str {
        &self.details.booking_reference
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl FieldError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Booking payload as posted by the frontend after payment. Every field is
/// optional here; `validate` decides what is actually required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBookingRequest {
    pub booking_reference: Option<String>,
    pub transaction_id: Option<String>,
    pub user_id: Option<String>,
    pub booking_type: Option<String>,
    pub item_id: Option<String>,
    pub provider_id: Option<String>,
    pub item_name: Option<String>,
    pub item_code: Option<String>,
    pub item_details: Option<Value>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_time: Option<String>,
    pub arrival_time: Option<String>,
    pub check_in_date: Option<String>,
    pub check_out_date: Option<String>,
    pub passenger_name: Option<String>,
    pub passenger_email: Option<String>,
    pub passenger_phone: Option<String>,
    pub passenger_gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub nationality: Option<String>,
    pub passport_number: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub payment_method: Option<String>,
    pub payment_status: Option<String>,
    pub amount: Option<Value>,
    pub currency: Option<String>,
    pub order_id: Option<String>,
    pub beckn_transaction_id: Option<String>,
    pub beckn_message_id: Option<String>,
    pub booking_metadata: Option<Value>,
}

impl CreateBookingRequest {
    pub fn validate(self) -> Result<NewBooking, FieldError> {
        let CreateBookingRequest {
            booking_reference,
            transaction_id,
            user_id,
            booking_type,
            item_id,
            provider_id,
            item_name,
            item_code,
            item_details,
            origin,
            destination,
            departure_time,
            arrival_time,
            check_in_date,
            check_out_date,
            passenger_name,
            passenger_email,
            passenger_phone,
            passenger_gender,
            date_of_birth,
            nationality,
            passport_number,
            address_line1,
            address_line2,
            city,
            state,
            postal_code,
            country,
            payment_method,
            payment_status,
            amount,
            currency,
            order_id,
            beckn_transaction_id,
            beckn_message_id,
            booking_metadata,
        } = self;

        let booking_reference = required("booking_reference", booking_reference)?;
        let transaction_id = required("transaction_id", transaction_id)?;

        let raw_type = required("booking_type", booking_type)?;
        let booking_type = BookingType::parse(&raw_type).ok_or_else(|| {
            FieldError::new(
                "booking_type",
                format!("unknown booking type '{raw_type}', expected flight, hotel, bus or train"),
            )
        })?;

        // Names and codes are resolved here, from the catalog item if needed,
        // so nothing downstream has to guess them.
        let item_id = required("item_id", item_id)?;
        let item_name = present(item_name)
            .or_else(|| catalog_field(item_details.as_ref(), "name"))
            .ok_or_else(|| {
                FieldError::new("item_name", "required (or item_details.descriptor.name)")
            })?;
        let item_code = present(item_code).or_else(|| catalog_field(item_details.as_ref(), "code"));

        let itinerary = build_itinerary(
            booking_type,
            ItineraryFields {
                origin: present(origin),
                destination: present(destination),
                departure_time: present(departure_time),
                arrival_time: present(arrival_time),
                check_in_date: present(check_in_date),
                check_out_date: present(check_out_date),
            },
        )?;

        let passenger = Passenger {
            name: required("passenger_name", passenger_name)?,
            email: normalize_email(&required("passenger_email", passenger_email)?)?,
            phone: required("passenger_phone", passenger_phone)?,
            gender: present(passenger_gender),
            date_of_birth: present(date_of_birth)
                .map(|d| parse_date("date_of_birth", &d))
                .transpose()?,
            nationality: present(nationality),
            passport_number: present(passport_number),
            address: Address {
                address_line1: present(address_line1),
                address_line2: present(address_line2),
                city: present(city),
                state: present(state),
                postal_code: present(postal_code),
                country: present(country),
            },
        };

        let payment_status = match present(payment_status) {
            Some(raw) => PaymentStatus::parse(&raw).ok_or_else(|| {
                FieldError::new(
                    "payment_status",
                    format!("unknown payment status '{raw}', expected PAID, PENDING, FAILED or REFUNDED"),
                )
            })?,
            None => PaymentStatus::Paid,
        };

        let payment = Payment {
            payment_method: present(payment_method),
            payment_status,
            amount: parse_amount(amount)?,
            currency: parse_currency(present(currency))?,
        };

        let order_id = present(order_id).unwrap_or_else(|| booking_reference.clone());

        Ok(NewBooking {
            booking_reference,
            transaction_id,
            user_id: present(user_id),
            booking_type,
            item: BookingItem {
                item_id,
                provider_id: present(provider_id),
                item_name,
                item_code,
                item_details,
            },
            itinerary,
            passenger,
            payment,
            order_id,
            beckn_transaction_id: present(beckn_transaction_id),
            beckn_message_id: present(beckn_message_id),
            booking_metadata,
        })
    }
}

struct ItineraryFields {
    origin: Option<String>,
    destination: Option<String>,
    departure_time: Option<String>,
    arrival_time: Option<String>,
    check_in_date: Option<String>,
    check_out_date: Option<String>,
}

fn build_itinerary(booking_type: BookingType, f: ItineraryFields) -> Result<Itinerary, FieldError> {
    if booking_type.is_lodging() {
        for (field, value) in [
            ("origin", &f.origin),
            ("destination", &f.destination),
            ("departure_time", &f.departure_time),
            ("arrival_time", &f.arrival_time),
        ] {
            if value.is_some() {
                return Err(FieldError::new(field, "not allowed for hotel bookings"));
            }
        }

        let check_in_date = parse_date("check_in_date", &required("check_in_date", f.check_in_date)?)?;
        let check_out_date =
            parse_date("check_out_date", &required("check_out_date", f.check_out_date)?)?;
        if check_out_date <= check_in_date {
            return Err(FieldError::new("check_out_date", "must be after check_in_date"));
        }

        return Ok(Itinerary::Stay {
            check_in_date,
            check_out_date,
        });
    }

    for (field, value) in [("check_in_date", &f.check_in_date), ("check_out_date", &f.check_out_date)] {
        if value.is_some() {
            return Err(FieldError::new(
                field,
                format!("not allowed for {} bookings", booking_type.as_str()),
            ));
        }
    }

    let origin = required("origin", f.origin)?;
    let destination = required("destination", f.destination)?;
    let departure_time =
        parse_datetime("departure_time", &required("departure_time", f.departure_time)?)?;
    let arrival_time = f
        .arrival_time
        .map(|t| parse_datetime("arrival_time", &t))
        .transpose()?;

    if let Some(arrival) = arrival_time {
        if arrival < departure_time {
            return Err(FieldError::new("arrival_time", "must not be before departure_time"));
        }
    }

    Ok(Itinerary::Transport {
        origin,
        destination,
        departure_time,
        arrival_time,
    })
}

pub(crate) fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn required(field: &'static str, value: Option<String>) -> Result<String, FieldError> {
    present(value).ok_or_else(|| FieldError::new(field, "is required"))
}

fn catalog_field(details: Option<&Value>, key: &str) -> Option<String> {
    let details = details?;
    details["descriptor"][key]
        .as_str()
        .or_else(|| details[key].as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn normalize_email(raw: &str) -> Result<String, FieldError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(FieldError::new("passenger_email", format!("'{raw}' is not an email address")));
    }
    Ok(email)
}

fn parse_amount(raw: Option<Value>) -> Result<f64, FieldError> {
    let amount = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Null) | None => return Err(FieldError::new("amount", "is required")),
        Some(_) => None,
    }
    .ok_or_else(|| FieldError::new("amount", "must be a number"))?;

    let rounded = (amount * 100.0).round() / 100.0;
    if !rounded.is_finite() || rounded < 0.0 {
        return Err(FieldError::new("amount", "must be a non-negative number"));
    }
    Ok(rounded)
}

fn parse_currency(raw: Option<String>) -> Result<String, FieldError> {
    let currency = raw.unwrap_or_else(|| "INR".to_string()).to_ascii_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(FieldError::new("currency", format!("'{currency}' is not a 3-letter currency code")));
    }
    Ok(currency)
}

/// Accepts RFC 3339 or a naive `YYYY-MM-DD[ T]HH:MM[:SS]`, read as UTC.
fn parse_datetime(field: &'static str, raw: &str) -> Result<DateTime<Utc>, FieldError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| FieldError::new(field, format!("'{raw}' is not a valid date-time")))
}

fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, FieldError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .ok_or_else(|| FieldError::new(field, format!("'{raw}' is not a valid date")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{flight_request, hotel_request};
    use serde_json::json;

    #[test]
    fn test_valid_flight_defaults() {
        let booking = flight_request("BK001", "TXN001").validate().unwrap();
        assert_eq!(booking.booking_type, BookingType::Flight);
        assert_eq!(booking.passenger.email, "asha@example.com");
        assert_eq!(booking.payment.payment_status, PaymentStatus::Paid);
        assert_eq!(booking.payment.currency, "INR");
        assert_eq!(booking.payment.amount, 5000.0);
        assert_eq!(booking.order_id, "BK001");
        assert!(matches!(booking.itinerary, Itinerary::Transport { .. }));
    }

    #[test]
    fn test_valid_hotel_with_string_amount() {
        let booking = hotel_request("BK002", "TXN002").validate().unwrap();
        assert_eq!(booking.payment.amount, 8999.5);
        match booking.itinerary {
            Itinerary::Stay {
                check_in_date,
                check_out_date,
            } => {
                assert_eq!(check_in_date.to_string(), "2025-07-01");
                assert_eq!(check_out_date.to_string(), "2025-07-03");
            }
            other => panic!("expected stay, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_reference_rejected() {
        let mut req = flight_request("BK001", "TXN001");
        req.booking_reference = Some("   ".to_string());
        let err = req.validate().unwrap_err();
        assert_eq!(err.field, "booking_reference");
    }

    #[test]
    fn test_unknown_booking_type_rejected() {
        let mut req = flight_request("BK001", "TXN001");
        req.booking_type = Some("cruise".to_string());
        assert_eq!(req.validate().unwrap_err().field, "booking_type");
    }

    #[test]
    fn test_booking_type_case_insensitive() {
        let mut req = flight_request("BK001", "TXN001");
        req.booking_type = Some("FLIGHT".to_string());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut req = flight_request("BK001", "TXN001");
        req.amount = Some(json!(-1));
        assert_eq!(req.validate().unwrap_err().field, "amount");
    }

    #[test]
    fn test_amount_overflowing_when_rounded_rejected() {
        let mut req = flight_request("BK001", "TXN001");
        req.amount = Some(json!(1.7e308));
        let err = req.validate().unwrap_err();
        assert_eq!(err.field, "amount");
    }

    #[test]
    fn test_non_numeric_amount_rejected() {
        let mut req = flight_request("BK001", "TXN001");
        req.amount = Some(json!("five thousand"));
        assert_eq!(req.validate().unwrap_err().field, "amount");

        let mut req = flight_request("BK001", "TXN001");
        req.amount = None;
        assert_eq!(req.validate().unwrap_err().field, "amount");
    }

    #[test]
    fn test_bad_email_rejected() {
        let mut req = flight_request("BK001", "TXN001");
        req.passenger_email = Some("not-an-email".to_string());
        assert_eq!(req.validate().unwrap_err().field, "passenger_email");
    }

    #[test]
    fn test_transport_requires_route() {
        let mut req = flight_request("BK001", "TXN001");
        req.origin = None;
        assert_eq!(req.validate().unwrap_err().field, "origin");

        let mut req = flight_request("BK001", "TXN001");
        req.departure_time = None;
        assert_eq!(req.validate().unwrap_err().field, "departure_time");
    }

    #[test]
    fn test_transport_rejects_stay_fields() {
        let mut req = flight_request("BK001", "TXN001");
        req.check_in_date = Some("2025-07-01".to_string());
        assert_eq!(req.validate().unwrap_err().field, "check_in_date");
    }

    #[test]
    fn test_hotel_rejects_transport_fields() {
        let mut req = hotel_request("BK002", "TXN002");
        req.origin = Some("BLR".to_string());
        assert_eq!(req.validate().unwrap_err().field, "origin");
    }

    #[test]
    fn test_arrival_before_departure_rejected() {
        let mut req = flight_request("BK001", "TXN001");
        req.arrival_time = Some("2025-06-15T09:00:00Z".to_string());
        assert_eq!(req.validate().unwrap_err().field, "arrival_time");
    }

    #[test]
    fn test_checkout_must_follow_checkin() {
        let mut req = hotel_request("BK002", "TXN002");
        req.check_out_date = Some("2025-07-01".to_string());
        assert_eq!(req.validate().unwrap_err().field, "check_out_date");
    }

    #[test]
    fn test_naive_departure_read_as_utc() {
        let mut req = flight_request("BK001", "TXN001");
        req.departure_time = Some("2025-06-15 10:00:00".to_string());
        req.arrival_time = None;
        let booking = req.validate().unwrap();
        match booking.itinerary {
            Itinerary::Transport { departure_time, .. } => {
                assert_eq!(departure_time.to_rfc3339(), "2025-06-15T10:00:00+00:00");
            }
            other => panic!("expected transport, got {other:?}"),
        }
    }

    #[test]
    fn test_item_name_resolved_from_catalog_item() {
        let mut req = flight_request("BK001", "TXN001");
        req.item_name = None;
        req.item_details = Some(json!({
            "id": "bus-12",
            "descriptor": { "name": "VRL Travels", "code": "VRL-12" }
        }));
        let booking = req.validate().unwrap();
        assert_eq!(booking.item.item_name, "VRL Travels");
        assert_eq!(booking.item.item_code.as_deref(), Some("VRL-12"));
    }

    #[test]
    fn test_item_name_required_without_catalog_item() {
        let mut req = flight_request("BK001", "TXN001");
        req.item_name = None;
        assert_eq!(req.validate().unwrap_err().field, "item_name");
    }

    #[test]
    fn test_bad_currency_rejected() {
        let mut req = flight_request("BK001", "TXN001");
        req.currency = Some("RUPEES".to_string());
        assert_eq!(req.validate().unwrap_err().field, "currency");
    }

    #[test]
    fn test_booking_status_transitions() {
        use BookingStatus::*;
        assert_eq!(Confirmed.transition_to(Cancelled), Ok(Transition::Applied));
        assert_eq!(Confirmed.transition_to(Completed), Ok(Transition::Applied));
        assert_eq!(Cancelled.transition_to(Cancelled), Ok(Transition::Unchanged));
        assert!(Cancelled.transition_to(Completed).is_err());
        assert!(Completed.transition_to(Cancelled).is_err());
        assert!(Cancelled.transition_to(Confirmed).is_err());
        assert!(Cancelled.is_terminal() && Completed.is_terminal() && !Confirmed.is_terminal());
    }

    #[test]
    fn test_payment_status_transitions() {
        use PaymentStatus::*;
        assert_eq!(Pending.transition_to(Paid), Ok(Transition::Applied));
        assert_eq!(Paid.transition_to(Refunded), Ok(Transition::Applied));
        assert_eq!(Failed.transition_to(Pending), Ok(Transition::Applied));
        assert!(Refunded.transition_to(Paid).is_err());
        assert!(Paid.transition_to(Pending).is_err());
    }
}
