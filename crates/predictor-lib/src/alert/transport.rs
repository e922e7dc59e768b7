//! Notification transports
//!
//! Publishing is fire-and-forget from the engine's side: a transport
//! makes one attempt and reports the outcome. Retries belong to
//! whatever sits behind the transport.

use crate::error::TransportError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use url::Url;

/// Publish/subscribe fan-out keyed by topic
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn publish(&self, topic: &str, subject: &str, message: &str)
        -> Result<(), TransportError>;
}

/// Webhook payload for one notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub topic: String,
    pub subject: String,
    pub message: String,
}

/// Posts notifications as JSON to a webhook
pub struct WebhookTransport {
    client: Client,
    endpoint: Url,
}

impl WebhookTransport {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let endpoint = Url::parse(endpoint).context("Invalid notification webhook URL")?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl NotificationTransport for WebhookTransport {
    async fn publish(
        &self,
        topic: &str,
        subject: &str,
        message: &str,
    ) -> Result<(), TransportError> {
        let payload = Notification {
            topic: topic.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
        };

        self.client
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Writes notifications to the log instead of sending them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn publish(
        &self,
        topic: &str,
        subject: &str,
        message: &str,
    ) -> Result<(), TransportError> {
        info!(
            event = "notification_logged",
            topic = %topic,
            subject = %subject,
            message = %message,
            "No notification endpoint configured, alert logged only"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_webhook_posts_json_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/notify")
            .match_body(Matcher::Json(serde_json::json!({
                "topic": "flood-alerts-watch",
                "subject": "Potomac River Flood WATCH",
                "message": "WATCH: ML model predicts 40.0% flood probability in next 6 hours",
            })))
            .with_status(202)
            .create_async()
            .await;

        let transport =
            WebhookTransport::new(&format!("{}/notify", server.url()), Duration::from_secs(2))
                .unwrap();
        transport
            .publish(
                "flood-alerts-watch",
                "Potomac River Flood WATCH",
                "WATCH: ML model predicts 40.0% flood probability in next 6 hours",
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_webhook_rejection_reports_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/notify")
            .with_status(500)
            .create_async()
            .await;

        let transport =
            WebhookTransport::new(&format!("{}/notify", server.url()), Duration::from_secs(2))
                .unwrap();
        let err = transport.publish("t", "s", "m").await.unwrap_err();
        assert!(matches!(err, TransportError::Rejected { status: 500 }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_log_transport_always_succeeds() {
        assert!(LogTransport.publish("t", "s", "m").await.is_ok());
    }
}
