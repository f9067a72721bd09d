//! Local indicator channel backed by tracing output.

use tracing::{error, info, warn};

use super::{Alert, ChannelPriority, Notifier, NotifyError};
use crate::types::Severity;

#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        match alert.severity {
            Severity::Critical => error!(kind = %alert.kind, "ALERT: {}", alert.message),
            Severity::Warning => warn!(kind = %alert.kind, "ALERT: {}", alert.message),
            Severity::Info => info!(kind = %alert.kind, "ALERT: {}", alert.message),
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "local"
    }

    fn priority(&self) -> ChannelPriority {
        ChannelPriority::Local
    }
}
