//! SMS Dispatcher
//!
//! One request per message: no retry, no queue, no backoff. The TextBee
//! gateway is reached at `POST {base}/gateway/devices/{device}/send-sms`
//! with the key in the `x-api-key` header.

use async_trait::async_trait;
use rollcall_common::config::SmsConfig;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("rollcall-mentor/", env!("CARGO_PKG_VERSION"));

/// SMS delivery failures
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("SMS gateway not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Gateway error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid request: {0}")]
    Invalid(String),
}

/// Delivers a text message to a phone number
#[async_trait]
pub trait SmsDispatcher: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), DispatchError>;
}

#[derive(Debug, Serialize)]
struct SendSmsRequest<'a> {
    recipients: [&'a str; 1],
    message: &'a str,
}

/// TextBee gateway client
pub struct TextBeeDispatcher {
    http_client: reqwest::Client,
    api_key: Option<String>,
    device_id: Option<String>,
    base_url: String,
}

impl TextBeeDispatcher {
    pub fn new(config: &SmsConfig) -> Result<Self, DispatchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            device_id: config.device_id.clone().filter(|d| !d.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.device_id.is_some()
    }
}

#[async_trait]
impl SmsDispatcher for TextBeeDispatcher {
    async fn send(&self, phone: &str, message: &str) -> Result<(), DispatchError> {
        let (Some(api_key), Some(device_id)) = (self.api_key.as_deref(), self.device_id.as_deref())
        else {
            return Err(DispatchError::NotConfigured(
                "SMS API key or device id missing".to_string(),
            ));
        };

        if phone.trim().is_empty() || message.trim().is_empty() {
            return Err(DispatchError::Invalid("phone and message are required".to_string()));
        }

        let url = format!("{}/gateway/devices/{}/send-sms", self.base_url, device_id);
        tracing::debug!(phone = %phone, message_len = message.len(), "Sending SMS");

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", api_key)
            .json(&SendSmsRequest {
                recipients: [phone],
                message,
            })
            .send()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(phone = %phone, status = status.as_u16(), "SMS gateway rejected message");
            return Err(DispatchError::Api {
                status: status.as_u16(),
                body: error_text,
            });
        }

        tracing::info!(phone = %phone, "SMS accepted by gateway");
        Ok(())
    }
}

/// Routes every message to one fixed number (test deployments)
pub struct OverrideRecipient {
    inner: Arc<dyn SmsDispatcher>,
    number: String,
}

impl OverrideRecipient {
    pub fn new(inner: Arc<dyn SmsDispatcher>, number: impl Into<String>) -> Self {
        Self {
            inner,
            number: number.into(),
        }
    }
}

#[async_trait]
impl SmsDispatcher for OverrideRecipient {
    async fn send(&self, phone: &str, message: &str) -> Result<(), DispatchError> {
        tracing::debug!(intended = %phone, actual = %self.number, "Recipient overridden");
        self.inner.send(&self.number, message).await
    }
}
