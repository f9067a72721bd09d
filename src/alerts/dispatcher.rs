//! Routes alerts to the channels whose priority covers the alert's severity.
//!
//! Individual channel failures are logged and never block other channels.

use tracing::{debug, info, warn};

use super::{Alert, LogNotifier, Notifier, NotifyError, WebhookNotifier};
use crate::config::AlertsConfig;

/// Result of delivering an alert to a single channel.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

pub struct AlertDispatcher {
    channels: Vec<Box<dyn Notifier>>,
}

impl AlertDispatcher {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Build the configured channel set.
    pub fn from_config(config: &AlertsConfig) -> Result<Self, NotifyError> {
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();
        if config.local_enabled {
            channels.push(Box::new(LogNotifier::new()));
        }
        for hook in &config.webhooks {
            channels.push(Box::new(WebhookNotifier::from_config(hook)?));
        }
        info!(channels = channels.len(), "Alert dispatcher initialized");
        Ok(Self::new(channels))
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Deliver `alert` to every channel that receives its severity.
    pub async fn dispatch(&self, alert: &Alert) -> Vec<DispatchResult> {
        info!(kind = %alert.kind, severity = %alert.severity, "Sending alert");

        let targets: Vec<&dyn Notifier> = self
            .channels
            .iter()
            .map(|c| c.as_ref())
            .filter(|c| c.priority().receives(alert.severity))
            .collect();

        if targets.is_empty() {
            debug!(severity = %alert.severity, "No channel receives this severity");
            return Vec::new();
        }

        let mut results = Vec::with_capacity(targets.len());
        for channel in targets {
            let start = std::time::Instant::now();
            let result = channel.send(alert).await;
            let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            let (success, error) = match result {
                Ok(()) => {
                    debug!(channel = channel.channel_name(), duration_ms, "Alert delivered");
                    (true, None)
                }
                Err(e) => {
                    warn!(
                        channel = channel.channel_name(),
                        error = %e,
                        duration_ms,
                        "Alert delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                success,
                error,
                duration_ms,
            });
        }
        results
    }
}
