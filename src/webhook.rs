// src/webhook.rs
use crate::error::TransportError;
use crate::notification::WebhookMessage;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, warn};

/// Destination for finished notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &WebhookMessage) -> Result<(), TransportError>;
}

/// Posts messages as JSON to a single webhook URL.
///
/// One attempt per message. Any completed HTTP exchange counts as delivered;
/// a non-success status is only logged.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: Client,
    url: String,
}

impl WebhookClient {
    /// Creates a client for `url`. The URL is only validated when a request is sent.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookClient {
    async fn notify(&self, message: &WebhookMessage) -> Result<(), TransportError> {
        let payload = serde_json::to_vec(message)?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!("Webhook accepted message with status {}", status);
        } else {
            warn!("Webhook responded with status {}", status);
        }
        Ok(())
    }
}
