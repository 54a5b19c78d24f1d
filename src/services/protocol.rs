//! Beckn adapter between the platform's bookings and the BPP services.
//!
//! Confirm persists the booking first and then asks the BPP; cancel asks
//! every BPP holding an ACTIVE mapping and then cancels locally no matter
//! what they answered. Upstream trouble in either flow becomes an operator
//! alert rather than a failed request.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Action, AlertKind, Booking, BookingStatus, BppBookingMapping, BppServiceType, Context,
    ContextIds, CreateBookingRequest, Envelope, Itinerary, MappingStatus, NewMapping,
    PassthroughRequest,
};
use crate::services::bpp::BppError;
use crate::services::{alerts, bookings, mappings};
use crate::state::AppState;

pub const DEFAULT_CANCELLATION_REASON: &str = "CUSTOMER_REQUEST";

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(flatten)]
    pub booking: CreateBookingRequest,
    #[serde(default)]
    pub context: ContextIds,
}

/// Something went wrong after the booking was stored. The booking stands.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: AlertKind,
    pub service: BppServiceType,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmOutcome {
    pub booking: Booking,
    pub mapping: Option<BppBookingMapping>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub cancellation_reason_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamCancel {
    Acknowledged,
    AlreadyCancelled,
    Unreachable,
    Rejected,
}

#[derive(Debug, Serialize)]
pub struct UpstreamCancelOutcome {
    pub service: BppServiceType,
    pub bpp_booking_id: String,
    pub outcome: UpstreamCancel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_charges: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelOutcome {
    pub booking: Booking,
    pub upstream: Vec<UpstreamCancelOutcome>,
}

pub fn build_context(
    config: &AppConfig,
    action: Action,
    ids: &ContextIds,
    bpp_uri: &str,
) -> Context {
    Context {
        domain: config.beckn_domain.clone(),
        country: config.beckn_country.clone(),
        city: config.beckn_city.clone(),
        action: action.as_str().to_string(),
        core_version: config.core_version.clone(),
        bap_id: config.bap_id.clone(),
        bap_uri: config.bap_uri.clone(),
        bpp_id: None,
        bpp_uri: Some(bpp_uri.to_string()),
        transaction_id: ids
            .transaction_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        message_id: ids
            .message_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        timestamp: Utc::now(),
        ttl: Some(format!("PT{}S", config.bpp_timeout_secs)),
    }
}

// ── Confirm ──

pub async fn confirm(state: &AppState, request: ConfirmRequest) -> Result<ConfirmOutcome, AppError> {
    let ConfirmRequest { booking, context } = request;
    let new = booking.validate()?;
    let service = BppServiceType::for_booking(new.booking_type, new.item.item_details.as_ref());

    let booking = {
        let conn = state.conn()?;
        match queries::find_booking_by_reference(&conn, &new.booking_reference)? {
            Some(existing) if existing.details.transaction_id != new.transaction_id => {
                return Err(AppError::Conflict(format!(
                    "booking_reference '{}' is already in use",
                    new.booking_reference
                )));
            }
            Some(existing) => {
                let mapping = queries::find_mapping(&conn, &existing.details.order_id, service)?;
                // A cancelled or completed booking must never be re-booked upstream.
                if mapping.is_some() || existing.booking_status.is_terminal() {
                    tracing::info!(
                        booking_reference = %existing.details.booking_reference,
                        booking_status = existing.booking_status.as_str(),
                        mapped = mapping.is_some(),
                        "confirm replayed, not calling BPP"
                    );
                    return Ok(ConfirmOutcome {
                        booking: existing,
                        mapping,
                        warnings: vec![],
                    });
                }
                existing
            }
            None => bookings::create(&conn, &new)?,
        }
    };

    let base_url = state.config.bpp_urls.url_for(service).to_string();
    let ids = ContextIds {
        transaction_id: context
            .transaction_id
            .or_else(|| booking.details.beckn_transaction_id.clone())
            .or_else(|| Some(booking.details.transaction_id.clone())),
        message_id: context
            .message_id
            .or_else(|| booking.details.beckn_message_id.clone()),
    };
    let envelope = Envelope {
        context: build_context(&state.config, Action::Confirm, &ids, &base_url),
        message: confirm_message(&booking),
    };

    let reference = booking.details.booking_reference.clone();
    let mut warnings = vec![];

    let response = match state.bpp.call(&base_url, Action::Confirm, &envelope).await {
        Ok(body) => body,
        Err(e) => {
            let warning = Warning {
                kind: AlertKind::ConfirmUpstreamFailed,
                service,
                detail: e.to_string(),
            };
            alerts::notify(state, warning.kind, &reference, Some(service), &warning.detail);
            warnings.push(warning);
            return Ok(ConfirmOutcome {
                booking,
                mapping: None,
                warnings,
            });
        }
    };

    let Some(bpp_booking_id) = extract_bpp_booking_id(&response) else {
        let warning = Warning {
            kind: AlertKind::MappingFailed,
            service,
            detail: "BPP confirmed without a booking id".to_string(),
        };
        alerts::notify(state, warning.kind, &reference, Some(service), &warning.detail);
        warnings.push(warning);
        return Ok(ConfirmOutcome {
            booking,
            mapping: None,
            warnings,
        });
    };

    let new_mapping = NewMapping {
        platform_booking_id: booking.details.order_id.clone(),
        platform_booking_reference: reference.clone(),
        bpp_service_type: service,
        bpp_booking_id,
        bpp_service_url: Some(base_url),
        beckn_transaction_id: Some(envelope.context.transaction_id.clone()),
        beckn_message_id: Some(envelope.context.message_id.clone()),
    };

    let mapping = {
        let conn = state.conn()?;
        match mappings::record(&conn, &new_mapping) {
            Ok(mapping) => Some(mapping),
            Err(e) => {
                let warning = Warning {
                    kind: AlertKind::MappingFailed,
                    service,
                    detail: format!("bpp_booking_id {}: {e}", new_mapping.bpp_booking_id),
                };
                alerts::raise(&conn, warning.kind, &reference, Some(service), &warning.detail);
                warnings.push(warning);
                None
            }
        }
    };

    Ok(ConfirmOutcome {
        booking,
        mapping,
        warnings,
    })
}

fn confirm_message(booking: &Booking) -> Value {
    let d = &booking.details;

    let mut item = d
        .item
        .item_details
        .clone()
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({}));
    item["id"] = json!(d.item.item_id);
    if item.get("descriptor").is_none() {
        item["descriptor"] = json!({ "name": d.item.item_name, "code": d.item.item_code });
    }

    let stops = match &d.itinerary {
        Itinerary::Transport {
            origin,
            destination,
            departure_time,
            arrival_time,
        } => json!([
            { "type": "START", "location": { "descriptor": { "code": origin } },
              "time": { "timestamp": departure_time } },
            { "type": "END", "location": { "descriptor": { "code": destination } },
              "time": { "timestamp": arrival_time } },
        ]),
        Itinerary::Stay {
            check_in_date,
            check_out_date,
        } => json!([
            { "type": "CHECK_IN", "time": { "timestamp": check_in_date } },
            { "type": "CHECK_OUT", "time": { "timestamp": check_out_date } },
        ]),
    };

    let amount = format!("{:.2}", d.payment.amount);
    json!({
        "order": {
            "id": d.order_id,
            "booking_reference": d.booking_reference,
            "provider": d.item.provider_id.as_ref().map(|id| json!({ "id": id })),
            "items": [item],
            "fulfillments": [{
                "stops": stops,
                "customer": {
                    "person": { "name": d.passenger.name, "gender": d.passenger.gender },
                    "contact": { "phone": d.passenger.phone, "email": d.passenger.email },
                },
            }],
            "billing": {
                "name": d.passenger.name,
                "email": d.passenger.email,
                "phone": d.passenger.phone,
                "address": d.passenger.address,
            },
            "quote": { "price": { "currency": d.payment.currency, "value": amount } },
            "payments": [{
                "type": "PRE-ORDER",
                "collected_by": "BAP",
                "status": d.payment.payment_status.as_str(),
                "params": {
                    "amount": amount,
                    "currency": d.payment.currency,
                    "method": d.payment.payment_method,
                    "transaction_id": d.transaction_id,
                },
            }],
        }
    })
}

/// BPPs report their id as `order.bpp_booking_id` or, in older services,
/// as the fulfillment id.
fn extract_bpp_booking_id(response: &Value) -> Option<String> {
    let order = &response["message"]["order"];
    [
        &order["bpp_booking_id"],
        &order["fulfillment"]["id"],
        &order["fulfillments"][0]["id"],
    ]
    .into_iter()
    .find_map(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

// ── Cancel ──

pub async fn cancel(state: &AppState, reference: &str, request: CancelRequest) -> Result<CancelOutcome, AppError> {
    let reason = request
        .cancellation_reason_id
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CANCELLATION_REASON.to_string());

    let (booking, active) = {
        let conn = state.conn()?;
        let booking = bookings::get_by_reference(&conn, reference)?;
        booking.booking_status.transition_to(BookingStatus::Cancelled)?;
        let active: Vec<BppBookingMapping> = mappings::by_platform_id(&conn, &booking.details.order_id)?
            .into_iter()
            .filter(|m| m.mapping_status == MappingStatus::Active)
            .collect();
        (booking, active)
    };

    let mut upstream = Vec::with_capacity(active.len());
    for mapping in active {
        upstream.push(cancel_upstream(state, &booking, &mapping, &reason).await);
    }

    let booking = {
        let conn = state.conn()?;
        bookings::cancel(&conn, reference)?
    };

    Ok(CancelOutcome { booking, upstream })
}

async fn cancel_upstream(
    state: &AppState,
    booking: &Booking,
    mapping: &BppBookingMapping,
    reason: &str,
) -> UpstreamCancelOutcome {
    let service = mapping.bpp_service_type;
    let base_url = mapping
        .bpp_service_url
        .clone()
        .unwrap_or_else(|| state.config.bpp_urls.url_for(service).to_string());
    let ids = ContextIds {
        transaction_id: mapping
            .beckn_transaction_id
            .clone()
            .or_else(|| Some(booking.details.transaction_id.clone())),
        message_id: None,
    };
    let envelope = Envelope {
        context: build_context(&state.config, Action::Cancel, &ids, &base_url),
        message: json!({
            "order_id": mapping.bpp_booking_id,
            "cancellation_reason_id": reason,
            "descriptor": {
                "name": "Booking Cancellation",
                "short_desc": "Customer requested cancellation",
            },
        }),
    };

    let mut result = UpstreamCancelOutcome {
        service,
        bpp_booking_id: mapping.bpp_booking_id.clone(),
        outcome: UpstreamCancel::Acknowledged,
        cancellation_charges: None,
        detail: None,
    };

    match state.bpp.call(&base_url, Action::Cancel, &envelope).await {
        Ok(body) => {
            result.cancellation_charges = cancellation_charges(&body);
        }
        Err(e) if e.is_already_cancelled() => {
            result.outcome = UpstreamCancel::AlreadyCancelled;
            result.detail = Some(e.to_string());
        }
        Err(e) => {
            let (outcome, kind) = classify_cancel_failure(&e);
            result.outcome = outcome;
            result.detail = Some(e.to_string());
            alerts::notify(state, kind, booking.reference(), Some(service), &e.to_string());
            return result;
        }
    }

    let updated = state
        .conn()
        .and_then(|conn| mappings::update_status(&conn, &mapping.bpp_booking_id, MappingStatus::Cancelled));
    if let Err(e) = updated {
        tracing::warn!(
            error = %e,
            bpp_booking_id = %mapping.bpp_booking_id,
            "BPP cancelled but mapping status not updated"
        );
    }

    result
}

fn classify_cancel_failure(err: &BppError) -> (UpstreamCancel, AlertKind) {
    if err.is_unavailable() {
        (UpstreamCancel::Unreachable, AlertKind::CancelUpstreamUnreachable)
    } else {
        (UpstreamCancel::Rejected, AlertKind::CancelUpstreamRejected)
    }
}

fn cancellation_charges(response: &Value) -> Option<f64> {
    let charges = &response["message"]["order"]["cancellation_charges"]["amount"];
    charges
        .as_f64()
        .or_else(|| charges.as_str().and_then(|s| s.trim().parse().ok()))
}

// ── Passthrough ──

/// Forwards a non-mutating Beckn call to the BPP serving `service`.
pub async fn forward(
    state: &AppState,
    service: &str,
    action: &str,
    request: PassthroughRequest,
) -> Result<Value, AppError> {
    let service = BppServiceType::parse(service)
        .ok_or_else(|| AppError::Validation(format!("unknown service '{service}'")))?;
    let action = Action::parse(action)
        .ok_or_else(|| AppError::Validation(format!("unknown action '{action}'")))?;
    if !action.is_passthrough() {
        return Err(AppError::Validation(format!(
            "{} is handled by the booking endpoints",
            action.as_str()
        )));
    }

    let PassthroughRequest { context, mut message } = request;
    if action.targets_order() {
        let conn = state.conn()?;
        rewrite_order_id(&conn, service, &mut message)?;
    }

    let base_url = state.config.bpp_urls.url_for(service);
    let envelope = Envelope {
        context: build_context(&state.config, action, &context, base_url),
        message,
    };

    tracing::info!(
        service = service.as_str(),
        action = action.as_str(),
        transaction_id = %envelope.context.transaction_id,
        "forwarding to BPP"
    );
    Ok(state.bpp.call(base_url, action, &envelope).await?)
}

/// Swaps a platform order id for the BPP's own id when a mapping exists.
fn rewrite_order_id(
    conn: &rusqlite::Connection,
    service: BppServiceType,
    message: &mut Value,
) -> Result<(), AppError> {
    let slot = if message["order_id"].is_string() {
        &mut message["order_id"]
    } else if message["order"]["id"].is_string() {
        &mut message["order"]["id"]
    } else {
        return Ok(());
    };

    let platform_id = slot.as_str().unwrap_or_default().to_string();
    if let Some(mapping) = queries::find_mapping(conn, &platform_id, service)? {
        *slot = Value::String(mapping.bpp_booking_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::fixtures::{flight_request, hotel_request};

    fn stored(conn: &rusqlite::Connection, req: CreateBookingRequest) -> Booking {
        bookings::create(conn, &req.validate().unwrap()).unwrap()
    }

    #[test]
    fn test_extract_bpp_booking_id_shapes() {
        let direct = json!({ "message": { "order": { "bpp_booking_id": "FLT-9" } } });
        let legacy = json!({ "message": { "order": { "fulfillment": { "id": "F-1" } } } });
        let list = json!({ "message": { "order": { "fulfillments": [{ "id": 42 }] } } });
        let blank = json!({ "message": { "order": { "bpp_booking_id": "  " } } });

        assert_eq!(extract_bpp_booking_id(&direct).as_deref(), Some("FLT-9"));
        assert_eq!(extract_bpp_booking_id(&legacy).as_deref(), Some("F-1"));
        assert_eq!(extract_bpp_booking_id(&list).as_deref(), Some("42"));
        assert_eq!(extract_bpp_booking_id(&blank), None);
        assert_eq!(extract_bpp_booking_id(&json!({ "ack": true })), None);
    }

    #[test]
    fn test_confirm_message_for_flight() {
        let conn = db::init_db(":memory:").unwrap();
        let booking = stored(&conn, flight_request("BK001", "TXN001"));

        let message = confirm_message(&booking);
        let order = &message["order"];
        assert_eq!(order["id"], "BK001");
        assert_eq!(order["items"][0]["id"], "flight-1");
        assert_eq!(order["items"][0]["descriptor"]["code"], "6E-204");
        assert_eq!(order["provider"]["id"], "indigo");
        assert_eq!(order["billing"]["email"], "asha@example.com");
        assert_eq!(order["payments"][0]["params"]["amount"], "5000.00");
        assert_eq!(order["payments"][0]["params"]["currency"], "INR");
        assert_eq!(order["fulfillments"][0]["stops"][0]["location"]["descriptor"]["code"], "BLR");
    }

    #[test]
    fn test_confirm_message_keeps_catalog_item() {
        let conn = db::init_db(":memory:").unwrap();
        let mut req = hotel_request("BK002", "TXN002");
        req.item_details = Some(json!({
            "id": "ignored",
            "descriptor": { "name": "Taj Deluxe" },
            "price": { "value": "8999.50" },
        }));
        let booking = stored(&conn, req);

        let message = confirm_message(&booking);
        let item = &message["order"]["items"][0];
        assert_eq!(item["id"], "hotel-7");
        assert_eq!(item["descriptor"]["name"], "Taj Deluxe");
        assert_eq!(item["price"]["value"], "8999.50");
        assert_eq!(message["order"]["fulfillments"][0]["stops"][0]["type"], "CHECK_IN");
        assert!(message["order"]["provider"].is_null());
    }

    #[test]
    fn test_rewrite_order_id_uses_mapping_for_service() {
        let conn = db::init_db(":memory:").unwrap();
        mappings::record(
            &conn,
            &NewMapping {
                platform_booking_id: "BK001".to_string(),
                platform_booking_reference: "BK001".to_string(),
                bpp_service_type: BppServiceType::Flights,
                bpp_booking_id: "FLT-9".to_string(),
                bpp_service_url: None,
                beckn_transaction_id: None,
                beckn_message_id: None,
            },
        )
        .unwrap();

        let mut flat = json!({ "order_id": "BK001" });
        rewrite_order_id(&conn, BppServiceType::Flights, &mut flat).unwrap();
        assert_eq!(flat["order_id"], "FLT-9");

        let mut nested = json!({ "order": { "id": "BK001" } });
        rewrite_order_id(&conn, BppServiceType::Flights, &mut nested).unwrap();
        assert_eq!(nested["order"]["id"], "FLT-9");

        let mut other_service = json!({ "order_id": "BK001" });
        rewrite_order_id(&conn, BppServiceType::Hotels, &mut other_service).unwrap();
        assert_eq!(other_service["order_id"], "BK001");

        let mut no_order = json!({ "intent": {} });
        rewrite_order_id(&conn, BppServiceType::Flights, &mut no_order).unwrap();
        assert_eq!(no_order, json!({ "intent": {} }));
    }

    #[test]
    fn test_cancellation_charges_number_or_string() {
        let n = json!({ "message": { "order": { "cancellation_charges": { "amount": 750 } } } });
        let s = json!({ "message": { "order": { "cancellation_charges": { "amount": "120.5" } } } });
        assert_eq!(cancellation_charges(&n), Some(750.0));
        assert_eq!(cancellation_charges(&s), Some(120.5));
        assert_eq!(cancellation_charges(&json!({})), None);
    }
}
