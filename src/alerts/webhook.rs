//! HTTP webhook notifier.
//!
//! Delivers alerts as JSON payloads to a configured URL. Email and SMS
//! gateways are reached through a webhook bridge.

use std::time::Duration;

use super::{Alert, ChannelPriority, Notifier, NotifyError};
use crate::config::WebhookConfig;

#[derive(Debug)]
pub struct WebhookNotifier {
    name: String,
    url: String,
    priority: ChannelPriority,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

#[derive(serde::Serialize)]
struct WebhookPayload<'a> {
    subject: String,
    body: String,
    alert: &'a Alert,
}

impl WebhookNotifier {
    pub fn new(
        name: String,
        url: String,
        priority: ChannelPriority,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(NotifyError::Config(format!("webhook url must be http(s): {url}")));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name,
            url,
            priority,
            client,
        })
    }

    pub fn from_config(config: &WebhookConfig) -> Result<Self, NotifyError> {
        Self::new(
            config.name.clone(),
            config.url.clone(),
            config.priority,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            subject: alert.subject(),
            body: alert.body(),
            alert,
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NotifyError::Rejected(format!(
                "webhook returned {status}: {body_text}"
            )));
        }

        tracing::debug!(url = %self.url, %status, "webhook alert delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> ChannelPriority {
        self.priority
    }
}
