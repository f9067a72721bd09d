//! Alert notification
//!
//! - `Notifier` trait for pluggable channels
//! - `LogNotifier`: local indicator channel, writes through tracing
//! - `WebhookNotifier`: JSON POST bridge for email/SMS gateways
//! - `AlertDispatcher`: routes an alert by severity to channels by priority

mod dispatcher;
mod local;
mod webhook;

pub use dispatcher::{AlertDispatcher, DispatchResult};
pub use local::LogNotifier;
pub use webhook::WebhookNotifier;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Event, EventType, Severity};

/// Errors that can occur during alert delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Channel rejected alert: {0}")]
    Rejected(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// What an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event_type", rename_all = "snake_case")]
pub enum AlertKind {
    Pollution(EventType),
    SensorFailure,
    Test,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Pollution(t) => write!(f, "{t}"),
            AlertKind::SensorFailure => write!(f, "sensor_failure"),
            AlertKind::Test => write!(f, "test"),
        }
    }
}

/// A notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "pH")]
    pub ph: Option<f64>,
    pub turbidity: Option<f64>,
    pub temperature: Option<f64>,
}

impl Alert {
    /// Alert for a detected event, carrying the readings of the sample
    /// that produced it.
    pub fn from_event(event: &Event, sample: &crate::types::Sample) -> Self {
        Self {
            kind: AlertKind::Pollution(event.event_type),
            severity: event.severity,
            message: event.description.clone(),
            timestamp: Utc::now(),
            ph: sample.ph,
            turbidity: sample.turbidity,
            temperature: sample.temperature,
        }
    }

    pub fn sensor_failure(consecutive: u32) -> Self {
        Self {
            kind: AlertKind::SensorFailure,
            severity: Severity::Critical,
            message: format!("Sensor communication failure ({consecutive} consecutive empty reads)"),
            timestamp: Utc::now(),
            ph: None,
            turbidity: None,
            temperature: None,
        }
    }

    pub fn test() -> Self {
        Self {
            kind: AlertKind::Test,
            severity: Severity::Info,
            message: "Test alert from AquaSentinel".to_string(),
            timestamp: Utc::now(),
            ph: None,
            turbidity: None,
            temperature: None,
        }
    }

    /// Subject line used by text channels.
    pub fn subject(&self) -> String {
        format!("AquaSentinel Alert: {}", self.severity.as_str().to_uppercase())
    }

    /// Multi-line plain-text body.
    pub fn body(&self) -> String {
        fn opt(v: Option<f64>) -> String {
            v.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
        }
        format!(
            "SEVERITY: {}\nTYPE: {}\nTIME: {}\n\nMESSAGE:\n{}\n\nWATER PARAMETERS:\n- pH: {}\n- Turbidity: {} NTU\n- Temperature: {}°C\n",
            self.severity.as_str().to_uppercase(),
            self.kind,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.message,
            opt(self.ph),
            opt(self.turbidity),
            opt(self.temperature),
        )
    }
}

/// Which severities a channel receives.
///
/// Critical reaches every channel, warning reaches standard and local,
/// info reaches local only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelPriority {
    /// Paging-style channel (SMS-like)
    Urgent,
    /// Mail-style channel
    Standard,
    /// On-site indicator
    Local,
}

impl ChannelPriority {
    pub fn receives(self, severity: Severity) -> bool {
        match self {
            ChannelPriority::Urgent => severity == Severity::Critical,
            ChannelPriority::Standard => severity >= Severity::Warning,
            ChannelPriority::Local => true,
        }
    }
}

/// Trait for alert channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an alert through this channel.
    async fn send(&self, alert: &Alert) -> Result<(), NotifyError>;

    /// Human-readable name for this channel.
    fn channel_name(&self) -> &str;

    fn priority(&self) -> ChannelPriority;
}
