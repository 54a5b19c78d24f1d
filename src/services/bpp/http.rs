use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use super::{BppClient, BppError};
use crate::models::{Action, Envelope};

pub struct HttpBppClient {
    client: reqwest::Client,
}

impl HttpBppClient {
    /// Every call is bounded by `timeout`; past it the BPP counts as unreachable.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("failed to build BPP HTTP client")?;
        Ok(Self { client })
    }
}

fn classify(url: &str, err: reqwest::Error) -> BppError {
    if err.is_timeout() {
        BppError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_connect() || err.is_request() {
        BppError::Unreachable {
            url: url.to_string(),
            reason: err.to_string(),
        }
    } else {
        BppError::InvalidResponse {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl BppClient for HttpBppClient {
    async fn call(&self, base_url: &str, action: Action, request: &Envelope) -> Result<Value, BppError> {
        let url = format!("{}/{}", base_url.trim_end_matches('/'), action.as_str());

        tracing::info!(
            url = %url,
            transaction_id = %request.context.transaction_id,
            message_id = %request.context.message_id,
            "sending request to BPP"
        );

        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| classify(&url, e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| classify(&url, e))?;

        tracing::info!(url = %url, status = %status, "received response from BPP");

        // Gateway errors mean nobody behind the proxy answered.
        if matches!(status.as_u16(), 502..=504) {
            return Err(BppError::Unreachable {
                url,
                reason: format!("HTTP {status}"),
            });
        }

        let body: Option<Value> = serde_json::from_str(&text).ok();
        let error_message = body
            .as_ref()
            .and_then(|b| b["error"]["message"].as_str())
            .map(|s| s.to_string());

        if !status.is_success() {
            return Err(BppError::Rejected {
                url,
                status: status.as_u16(),
                message: error_message.unwrap_or(text),
            });
        }

        if let Some(message) = error_message {
            return Err(BppError::Rejected {
                url,
                status: status.as_u16(),
                message,
            });
        }

        body.ok_or_else(|| BppError::InvalidResponse {
            url,
            reason: "response body is not JSON".to_string(),
        })
    }
}
