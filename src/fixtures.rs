//! Booking payloads shared by unit tests.

use serde_json::json;

use crate::models::CreateBookingRequest;

fn passenger(mut req: CreateBookingRequest) -> CreateBookingRequest {
    req.passenger_name = Some("Asha Rao".to_string());
    req.passenger_email = Some("Asha@Example.com".to_string());
    req.passenger_phone = Some("+919800000000".to_string());
    req
}

pub fn flight_request(reference: &str, transaction_id: &str) -> CreateBookingRequest {
    passenger(CreateBookingRequest {
        booking_reference: Some(reference.to_string()),
        transaction_id: Some(transaction_id.to_string()),
        booking_type: Some("flight".to_string()),
        item_id: Some("flight-1".to_string()),
        provider_id: Some("indigo".to_string()),
        item_name: Some("IndiGo".to_string()),
        item_code: Some("6E-204".to_string()),
        origin: Some("BLR".to_string()),
        destination: Some("DEL".to_string()),
        departure_time: Some("2025-06-15T10:00:00Z".to_string()),
        arrival_time: Some("2025-06-15T12:45:00Z".to_string()),
        payment_method: Some("card".to_string()),
        amount: Some(json!(5000)),
        ..Default::default()
    })
}

pub fn hotel_request(reference: &str, transaction_id: &str) -> CreateBookingRequest {
    passenger(CreateBookingRequest {
        booking_reference: Some(reference.to_string()),
        transaction_id: Some(transaction_id.to_string()),
        booking_type: Some("hotel".to_string()),
        item_id: Some("hotel-7".to_string()),
        item_name: Some("Taj".to_string()),
        check_in_date: Some("2025-07-01".to_string()),
        check_out_date: Some("2025-07-03".to_string()),
        amount: Some(json!("8999.50")),
        ..Default::default()
    })
}

pub fn bus_request(reference: &str, transaction_id: &str) -> CreateBookingRequest {
    let mut req = flight_request(reference, transaction_id);
    req.booking_type = Some("bus".to_string());
    req.item_id = Some("bus-12".to_string());
    req.item_name = Some("VRL Travels".to_string());
    req.amount = Some(json!(900));
    req
}

pub fn train_request(reference: &str, transaction_id: &str) -> CreateBookingRequest {
    let mut req = flight_request(reference, transaction_id);
    req.booking_type = Some("train".to_string());
    req.item_id = Some("train-12627".to_string());
    req.item_name = Some("Karnataka Express".to_string());
    req.amount = Some(json!(1450));
    req
}
