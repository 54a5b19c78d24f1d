use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Search,
    Select,
    Init,
    Confirm,
    Status,
    Track,
    Cancel,
    Update,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Search => "search",
            Action::Select => "select",
            Action::Init => "init",
            Action::Confirm => "confirm",
            Action::Status => "status",
            Action::Track => "track",
            Action::Cancel => "cancel",
            Action::Update => "update",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "search" => Some(Action::Search),
            "select" => Some(Action::Select),
            "init" => Some(Action::Init),
            "confirm" => Some(Action::Confirm),
            "status" => Some(Action::Status),
            "track" => Some(Action::Track),
            "cancel" => Some(Action::Cancel),
            "update" => Some(Action::Update),
            _ => None,
        }
    }

    /// Actions forwarded verbatim. Confirm and cancel change platform state
    /// and only run through the booking adapters.
    pub fn is_passthrough(&self) -> bool {
        !matches!(self, Action::Confirm | Action::Cancel)
    }

    /// Actions whose message refers to an existing order.
    pub fn targets_order(&self) -> bool {
        matches!(self, Action::Status | Action::Track | Action::Update)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Context {
    pub domain: String,
    pub country: String,
    pub city: String,
    pub action: String,
    pub core_version: String,
    pub bap_id: String,
    pub bap_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpp_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpp_uri: Option<String>,
    pub transaction_id: String,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub context: Context,
    pub message: Value,
}

/// Correlation ids a caller may pin; missing ones are generated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextIds {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PassthroughRequest {
    #[serde(default)]
    pub context: ContextIds,
    #[serde(default)]
    pub message: Value,
}
