use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::booking::{present, required, BookingStatus, BookingType, FieldError};
use super::transition::{InvalidTransition, Transition};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BppServiceType {
    Flights,
    InternationalFlights,
    Hotels,
    Buses,
    Trains,
    Experiences,
}

impl BppServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BppServiceType::Flights => "flights",
            BppServiceType::InternationalFlights => "international_flights",
            BppServiceType::Hotels => "hotels",
            BppServiceType::Buses => "buses",
            BppServiceType::Trains => "trains",
            BppServiceType::Experiences => "experiences",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flights" => Some(BppServiceType::Flights),
            "international_flights" => Some(BppServiceType::InternationalFlights),
            "hotels" => Some(BppServiceType::Hotels),
            "buses" => Some(BppServiceType::Buses),
            "trains" => Some(BppServiceType::Trains),
            "experiences" => Some(BppServiceType::Experiences),
            _ => None,
        }
    }

    /// Which BPP fulfils a booking of this type. Flights go to the
    /// international BPP when the catalog item says so.
    pub fn for_booking(booking_type: BookingType, item_details: Option<&Value>) -> Self {
        match booking_type {
            BookingType::Flight if is_international(item_details) => {
                BppServiceType::InternationalFlights
            }
            BookingType::Flight => BppServiceType::Flights,
            BookingType::Hotel => BppServiceType::Hotels,
            BookingType::Bus => BppServiceType::Buses,
            BookingType::Train => BppServiceType::Trains,
        }
    }
}

fn is_international(item_details: Option<&Value>) -> bool {
    let Some(details) = item_details else {
        return false;
    };
    let flight_type = details["flight_type"].as_str().unwrap_or("");
    let category = details["category"]
        .as_str()
        .or_else(|| details["category_id"].as_str())
        .unwrap_or("");
    flight_type.eq_ignore_ascii_case("INTERNATIONAL")
        || category.to_ascii_lowercase().contains("international")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum MappingStatus {
    Active,
    Cancelled,
    Failed,
}

impl MappingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingStatus::Active => "ACTIVE",
            MappingStatus::Cancelled => "CANCELLED",
            MappingStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(MappingStatus::Active),
            "CANCELLED" => Some(MappingStatus::Cancelled),
            "FAILED" => Some(MappingStatus::Failed),
            _ => None,
        }
    }

    /// ACTIVE may move to CANCELLED or FAILED; both are terminal.
    pub fn transition_to(&self, next: MappingStatus) -> Result<Transition, InvalidTransition> {
        if *self == next {
            return Ok(Transition::Unchanged);
        }
        match (self, next) {
            (MappingStatus::Active, MappingStatus::Cancelled)
            | (MappingStatus::Active, MappingStatus::Failed) => Ok(Transition::Applied),
            _ => Err(InvalidTransition {
                from: self.as_str(),
                to: next.as_str(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BppBookingMapping {
    pub id: i64,
    pub platform_booking_id: String,
    pub platform_booking_reference: String,
    pub bpp_service_type: BppServiceType,
    pub bpp_booking_id: String,
    pub bpp_service_url: Option<String>,
    pub beckn_transaction_id: Option<String>,
    pub beckn_message_id: Option<String>,
    pub mapping_status: MappingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMapping {
    pub platform_booking_id: String,
    pub platform_booking_reference: String,
    pub bpp_service_type: BppServiceType,
    pub bpp_booking_id: String,
    #[serde(default)]
    pub bpp_service_url: Option<String>,
    #[serde(default)]
    pub beckn_transaction_id: Option<String>,
    #[serde(default)]
    pub beckn_message_id: Option<String>,
}

/// Mapping payload as posted by the confirm flow or an operator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordMappingRequest {
    pub platform_booking_id: Option<String>,
    pub platform_booking_reference: Option<String>,
    pub bpp_service_type: Option<String>,
    pub bpp_booking_id: Option<String>,
    pub bpp_service_url: Option<String>,
    pub beckn_transaction_id: Option<String>,
    pub beckn_message_id: Option<String>,
}

impl RecordMappingRequest {
    pub fn validate(self) -> Result<NewMapping, FieldError> {
        let platform_booking_id = required("platform_booking_id", self.platform_booking_id)?;
        let service = required("bpp_service_type", self.bpp_service_type)?;
        let bpp_service_type = BppServiceType::parse(&service)
            .ok_or_else(|| FieldError::new("bpp_service_type", format!("unknown service '{service}'")))?;

        Ok(NewMapping {
            platform_booking_reference: present(self.platform_booking_reference)
                .unwrap_or_else(|| platform_booking_id.clone()),
            platform_booking_id,
            bpp_service_type,
            bpp_booking_id: required("bpp_booking_id", self.bpp_booking_id)?,
            bpp_service_url: present(self.bpp_service_url),
            beckn_transaction_id: present(self.beckn_transaction_id),
            beckn_message_id: present(self.beckn_message_id),
        })
    }
}

/// Mapping joined with the booking it points at, when that booking exists.
#[derive(Debug, Clone, Serialize)]
pub struct MappingWithBooking {
    #[serde(flatten)]
    pub mapping: BppBookingMapping,
    pub booking_type: Option<BookingType>,
    pub item_name: Option<String>,
    pub passenger_name: Option<String>,
    pub amount: Option<f64>,
    pub booking_status: Option<BookingStatus>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MappingStatsRow {
    pub bpp_service_type: String,
    pub mapping_status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MappingStats {
    pub total_mappings: i64,
    pub by_service_type: BTreeMap<String, BTreeMap<String, i64>>,
    pub by_status: BTreeMap<String, i64>,
    pub raw: Vec<MappingStatsRow>,
}

impl MappingStats {
    pub fn from_rows(rows: Vec<MappingStatsRow>) -> Self {
        let mut stats = MappingStats {
            total_mappings: 0,
            by_service_type: BTreeMap::new(),
            by_status: BTreeMap::new(),
            raw: Vec::new(),
        };

        for row in &rows {
            stats.total_mappings += row.count;
            *stats
                .by_service_type
                .entry(row.bpp_service_type.clone())
                .or_default()
                .entry(row.mapping_status.clone())
                .or_default() += row.count;
            *stats.by_status.entry(row.mapping_status.clone()).or_default() += row.count;
        }

        stats.raw = rows;
        stats
    }
}
