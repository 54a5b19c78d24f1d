pub mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{Action, Envelope};

#[derive(Debug, thiserror::Error)]
pub enum BppError {
    #[error("timed out waiting for {url}")]
    Timeout { url: String },

    #[error("cannot reach {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("{url} rejected the request ({status}): {message}")]
    Rejected {
        url: String,
        status: u16,
        message: String,
    },

    #[error("invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },
}

impl BppError {
    /// The BPP never gave an answer we can act on.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BppError::Timeout { .. } | BppError::Unreachable { .. })
    }

    pub fn is_already_cancelled(&self) -> bool {
        match self {
            BppError::Rejected { message, .. } => {
                let message = message.to_ascii_lowercase();
                message.contains("already cancelled") || message.contains("already canceled")
            }
            _ => false,
        }
    }
}

/// Outbound Beckn calls to a BPP. One implementation speaks HTTP; tests
/// substitute their own.
#[async_trait]
pub trait BppClient: Send + Sync {
    async fn call(&self, base_url: &str, action: Action, request: &Envelope) -> Result<Value, BppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(message: &str) -> BppError {
        BppError::Rejected {
            url: "http://bpp/cancel".to_string(),
            status: 400,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_already_cancelled_detection() {
        assert!(rejected("Booking FLT-9 is already cancelled").is_already_cancelled());
        assert!(rejected("ALREADY CANCELED").is_already_cancelled());
        assert!(!rejected("booking not found").is_already_cancelled());
        assert!(!BppError::Timeout {
            url: "http://bpp".to_string()
        }
        .is_already_cancelled());
    }

    #[test]
    fn test_unavailable_classification() {
        assert!(BppError::Timeout {
            url: "http://bpp".to_string()
        }
        .is_unavailable());
        assert!(BppError::Unreachable {
            url: "http://bpp".to_string(),
            reason: "connection refused".to_string()
        }
        .is_unavailable());
        assert!(!rejected("nope").is_unavailable());
    }
}
