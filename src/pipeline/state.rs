//! Application State and System Status
//!
//! Last-known-good snapshot written by the monitor loop and read by the
//! status API.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Instant;

use crate::analyzer::HistoryStatistics;
use crate::config::defaults::RECENT_EVENTS_KEPT;
use crate::types::{ClassificationResult, Event, Sample};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
///
/// Wrapped in `Arc<RwLock<>>`; only the monitor loop writes to it.
#[derive(Debug, Clone, Serialize)]
pub struct AppState {
    /// System uptime (serializes as seconds via `uptime_secs`)
    #[serde(skip)]
    pub uptime: Instant,

    /// Current system status
    pub status: SystemStatus,

    pub station_name: String,

    /// Most recent non-empty sample
    pub latest_sample: Option<Sample>,

    pub latest_classification: Option<ClassificationResult>,

    /// Newest last, bounded to `RECENT_EVENTS_KEPT`
    pub recent_events: VecDeque<Event>,

    /// Samples taken from the source, including empty ones
    pub samples_processed: u64,

    pub events_detected: u64,

    pub alerts_sent: u64,

    pub consecutive_failures: u32,

    pub last_sample_time: Option<chrono::DateTime<chrono::Utc>>,

    /// Rolling-window statistics as of the latest sample
    pub history_statistics: HistoryStatistics,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            uptime: Instant::now(),
            status: SystemStatus::Initializing,
            station_name: "AquaSentinel".to_string(),
            latest_sample: None,
            latest_classification: None,
            recent_events: VecDeque::with_capacity(RECENT_EVENTS_KEPT),
            samples_processed: 0,
            events_detected: 0,
            alerts_sent: 0,
            consecutive_failures: 0,
            last_sample_time: None,
            history_statistics: HistoryStatistics::default(),
        }
    }
}

impl AppState {
    pub fn new(station_name: impl Into<String>) -> Self {
        Self {
            station_name: station_name.into(),
            ..Self::default()
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.uptime.elapsed().as_secs()
    }

    /// Record a detected event, evicting the oldest beyond the ring size.
    pub fn push_event(&mut self, event: Event) {
        if self.recent_events.len() >= RECENT_EVENTS_KEPT {
            self.recent_events.pop_front();
        }
        self.recent_events.push_back(event);
        self.events_detected += 1;
    }
}

/// System operational status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SystemStatus {
    /// Waiting for the first sample
    Initializing,
    /// Normal operation
    Monitoring,
    /// The latest sample produced at least one event
    Alert,
    /// Consecutive sensor reads are failing
    SensorError,
    /// Source exhausted or shutdown requested
    Stopped,
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemStatus::Initializing => write!(f, "Initializing"),
            SystemStatus::Monitoring => write!(f, "Monitoring"),
            SystemStatus::Alert => write!(f, "Alert"),
            SystemStatus::SensorError => write!(f, "Sensor Error"),
            SystemStatus::Stopped => write!(f, "Stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventType, Severity};

    fn event(n: usize) -> Event {
        Event {
            event_type: EventType::TurbiditySpike,
            severity: Severity::Warning,
            description: format!("event {n}"),
            ph: None,
            turbidity: Some(30.0),
            temperature: None,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_app_state_default() {
        let state = AppState::default();
        assert_eq!(state.samples_processed, 0);
        assert_eq!(state.status, SystemStatus::Initializing);
        assert!(state.latest_sample.is_none());
    }

    #[test]
    fn test_recent_events_ring_is_bounded() {
        let mut state = AppState::new("Test Station");
        for n in 0..RECENT_EVENTS_KEPT + 5 {
            state.push_event(event(n));
        }
        assert_eq!(state.recent_events.len(), RECENT_EVENTS_KEPT);
        assert_eq!(state.events_detected, (RECENT_EVENTS_KEPT + 5) as u64);
        assert_eq!(state.recent_events.front().unwrap().description, "event 5");
    }

    #[test]
    fn test_system_status_display() {
        assert_eq!(format!("{}", SystemStatus::Initializing), "Initializing");
        assert_eq!(format!("{}", SystemStatus::Monitoring), "Monitoring");
        assert_eq!(format!("{}", SystemStatus::Alert), "Alert");
        assert_eq!(format!("{}", SystemStatus::SensorError), "Sensor Error");
        assert_eq!(format!("{}", SystemStatus::Stopped), "Stopped");
    }
}
