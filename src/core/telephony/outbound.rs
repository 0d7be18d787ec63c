//! Outbound call placement through the Plivo REST API.
//!
//! Plivo dials `to` from `from` and, once answered, fetches the answer XML
//! from `answer_url`. The XML served by `/webhook` then opens the media
//! stream back to this server.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PlivoConfig;

/// Default Plivo API base URL.
pub const PLIVO_API_URL: &str = "https://api.plivo.com";

/// Errors raised while placing an outbound call.
#[derive(Debug, Error)]
pub enum OutboundCallError {
    /// A required Plivo setting is not configured
    #[error("Missing Plivo setting: {0}")]
    MissingSetting(&'static str),

    /// The HTTP request could not be completed
    #[error("Plivo request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Plivo answered with a non-success status
    #[error("Plivo rejected the call ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Body of the `Call` create request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundCall {
    pub from: String,
    pub to: String,
    pub answer_url: String,
    pub answer_method: String,
}

impl OutboundCall {
    /// Build the call configured by `PLIVO_FROM_NUMBER`, `PLIVO_TO_NUMBER` and `PLIVO_ANSWER_XML`.
    pub fn from_config(config: &PlivoConfig) -> Result<Self, OutboundCallError> {
        let from = config
            .from_number
            .clone()
            .ok_or(OutboundCallError::MissingSetting("from_number"))?;
        let to = config
            .to_number
            .clone()
            .ok_or(OutboundCallError::MissingSetting("to_number"))?;
        let answer_url = config
            .answer_url
            .clone()
            .ok_or(OutboundCallError::MissingSetting("answer_url"))?;

        Ok(Self {
            from,
            to,
            answer_url,
            answer_method: "GET".to_string(),
        })
    }
}

/// Plivo's acknowledgement of a queued call.
#[derive(Debug, Clone, Deserialize)]
pub struct CallResponse {
    pub api_id: String,
    pub message: String,
    #[serde(default)]
    pub request_uuid: Option<String>,
}

/// Minimal Plivo REST client.
pub struct PlivoClient {
    http: reqwest::Client,
    api_url: String,
    auth_id: String,
    auth_token: String,
}

impl PlivoClient {
    pub fn new(config: &PlivoConfig) -> Result<Self, OutboundCallError> {
        let auth_id = config
            .auth_id
            .clone()
            .ok_or(OutboundCallError::MissingSetting("auth_id"))?;
        let auth_token = config
            .auth_token
            .clone()
            .ok_or(OutboundCallError::MissingSetting("auth_token"))?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            auth_id,
            auth_token,
        })
    }

    fn call_endpoint(&self) -> String {
        format!("{}/v1/Account/{}/Call/", self.api_url, self.auth_id)
    }

    /// Ask Plivo to place `call`.
    pub async fn place_call(&self, call: &OutboundCall) -> Result<CallResponse, OutboundCallError> {
        tracing::info!(to = %call.to, from = %call.from, "Placing outbound call");

        let response = self
            .http
            .post(self.call_endpoint())
            .basic_auth(&self.auth_id, Some(&self.auth_token))
            .json(call)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OutboundCallError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let ack: CallResponse = response.json().await?;
        tracing::info!(request_uuid = ?ack.request_uuid, "Plivo accepted call: {}", ack.message);
        Ok(ack)
    }
}

impl Drop for PlivoClient {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.auth_token.zeroize();
    }
}
