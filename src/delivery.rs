//! Delivery of verification payloads to the backend endpoint.
//!
//! Submission is fire-and-forget with optimistic local success: transport
//! errors, error statuses and undecodable responses are logged and answered
//! with a synthesized success receipt, so the caller never sees a failure.

use crate::config::Config;
use crate::payload::VerificationPayload;
use serde::Serialize;
use std::time::Duration;

/// Path of the submission endpoint below the configured base URL.
pub const SUBMISSION_PATH: &str = "/api/captcha";

/// Delivery configuration.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Backend base URL
    pub endpoint: String,
    /// `verification_type` field of the envelope
    pub verification_type: String,
    /// `source` field of the envelope
    pub source: String,
    /// Request timeout
    pub timeout: Duration,
}

impl DeliveryConfig {
    /// Create a delivery configuration with the default envelope fields.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let defaults = Config::default();
        Self {
            endpoint: endpoint.into(),
            verification_type: defaults.verification_type,
            source: defaults.source,
            timeout: defaults.request_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            verification_type: config.verification_type.clone(),
            source: config.source.clone(),
            timeout: config.request_timeout,
        }
    }

    /// Get the submission endpoint URL.
    pub fn submission_url(&self) -> String {
        format!("{}{SUBMISSION_PATH}", self.endpoint.trim_end_matches('/'))
    }
}

/// Delivery error types. Never surfaced past [`DeliveryClient::submit`].
#[derive(Debug)]
pub enum DeliveryError {
    /// Client configuration error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
    /// Response body was not JSON
    Serialization(String),
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::Config(msg) => write!(f, "Delivery config error: {msg}"),
            DeliveryError::Network(msg) => write!(f, "Delivery network error: {msg}"),
            DeliveryError::Server { status, message } => {
                write!(f, "Delivery server error ({status}): {message}")
            }
            DeliveryError::Serialization(msg) => write!(f, "Delivery serialization error: {msg}"),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Body posted to the submission endpoint.
#[derive(Debug, Serialize)]
pub struct SubmissionEnvelope<'a> {
    pub user_data: &'a VerificationPayload,
    pub verification_type: &'a str,
    pub source: &'a str,
}

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryReceipt {
    /// The endpoint answered 2xx with a JSON body
    Accepted(serde_json::Value),
    /// The submission failed; a success was synthesized locally
    Synthesized {
        response: serde_json::Value,
        reason: String,
    },
}

impl DeliveryReceipt {
    fn synthesized(reason: String) -> Self {
        DeliveryReceipt::Synthesized {
            response: serde_json::json!({
                "status": "success",
                "message": "Verification completed",
            }),
            reason,
        }
    }

    /// The response body, real or synthesized.
    pub fn response(&self) -> &serde_json::Value {
        match self {
            DeliveryReceipt::Accepted(response) => response,
            DeliveryReceipt::Synthesized { response, .. } => response,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, DeliveryReceipt::Accepted(_))
    }
}

/// HTTP client for submitting payloads.
#[derive(Clone)]
pub struct DeliveryClient {
    config: DeliveryConfig,
    client: reqwest::Client,
}

impl DeliveryClient {
    /// Create a new delivery client.
    pub fn new(config: DeliveryConfig) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DeliveryError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Submit a payload. Always yields a receipt; failures are absorbed.
    pub async fn submit(&self, payload: &VerificationPayload) -> DeliveryReceipt {
        match self.try_submit(payload).await {
            Ok(response) => {
                tracing::info!(session_id = payload.session_id(), "payload submitted");
                DeliveryReceipt::Accepted(response)
            }
            Err(e) => {
                tracing::warn!(
                    session_id = payload.session_id(),
                    error = %e,
                    "submission failed, continuing with local success"
                );
                DeliveryReceipt::synthesized(e.to_string())
            }
        }
    }

    async fn try_submit(
        &self,
        payload: &VerificationPayload,
    ) -> Result<serde_json::Value, DeliveryError> {
        let envelope = SubmissionEnvelope {
            user_data: payload,
            verification_type: &self.config.verification_type,
            source: &self.config.source,
        };

        let response = self
            .client
            .post(self.config.submission_url())
            .header("Content-Type", "application/json")
            .json(&envelope)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DeliveryError::Server {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| DeliveryError::Serialization(e.to_string()))
    }
}
