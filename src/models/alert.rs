use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mapping::BppServiceType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// Booking persisted but its mapping could not be recorded.
    MappingFailed,
    /// Booking persisted but the BPP confirm call failed.
    ConfirmUpstreamFailed,
    CancelUpstreamUnreachable,
    CancelUpstreamRejected,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::MappingFailed => "MAPPING_FAILED",
            AlertKind::ConfirmUpstreamFailed => "CONFIRM_UPSTREAM_FAILED",
            AlertKind::CancelUpstreamUnreachable => "CANCEL_UPSTREAM_UNREACHABLE",
            AlertKind::CancelUpstreamRejected => "CANCEL_UPSTREAM_REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MAPPING_FAILED" => Some(AlertKind::MappingFailed),
            "CONFIRM_UPSTREAM_FAILED" => Some(AlertKind::ConfirmUpstreamFailed),
            "CANCEL_UPSTREAM_UNREACHABLE" => Some(AlertKind::CancelUpstreamUnreachable),
            "CANCEL_UPSTREAM_REJECTED" => Some(AlertKind::CancelUpstreamRejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorAlert {
    pub id: i64,
    pub kind: AlertKind,
    pub booking_reference: String,
    pub service: Option<BppServiceType>,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}
