//! Pollution events emitted by the analyzer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// Kind of pollution event. Wire names are stable and used as storage tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "pH_critical_low")]
    PhCriticalLow,
    #[serde(rename = "pH_critical_high")]
    PhCriticalHigh,
    #[serde(rename = "pH_low")]
    PhLow,
    #[serde(rename = "pH_high")]
    PhHigh,
    #[serde(rename = "pH_rapid_change")]
    PhRapidChange,
    #[serde(rename = "turbidity_critical")]
    TurbidityCritical,
    #[serde(rename = "turbidity_high")]
    TurbidityHigh,
    #[serde(rename = "turbidity_spike")]
    TurbiditySpike,
    #[serde(rename = "temperature_extreme")]
    TemperatureExtreme,
    #[serde(rename = "temperature_rapid_change")]
    TemperatureRapidChange,
    #[serde(rename = "multi_parameter_degradation")]
    MultiParameterDegradation,
    #[serde(rename = "sustained_poor_pH")]
    SustainedPoorPh,
    #[serde(rename = "increasing_turbidity_trend")]
    IncreasingTurbidityTrend,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PhCriticalLow => "pH_critical_low",
            EventType::PhCriticalHigh => "pH_critical_high",
            EventType::PhLow => "pH_low",
            EventType::PhHigh => "pH_high",
            EventType::PhRapidChange => "pH_rapid_change",
            EventType::TurbidityCritical => "turbidity_critical",
            EventType::TurbidityHigh => "turbidity_high",
            EventType::TurbiditySpike => "turbidity_spike",
            EventType::TemperatureExtreme => "temperature_extreme",
            EventType::TemperatureRapidChange => "temperature_rapid_change",
            EventType::MultiParameterDegradation => "multi_parameter_degradation",
            EventType::SustainedPoorPh => "sustained_poor_pH",
            EventType::IncreasingTurbidityTrend => "increasing_turbidity_trend",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A detected pollution event.
///
/// The echoed readings are the values of the sample that triggered the event;
/// trend events carry none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub severity: Severity,
    pub description: String,
    #[serde(rename = "pH")]
    pub ph: Option<f64>,
    pub turbidity: Option<f64>,
    pub temperature: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Deduplication key used by the cooldown filter.
    pub fn cooldown_key(&self) -> (EventType, Severity) {
        (self.event_type, self.severity)
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.severity.as_str().to_uppercase(),
            self.event_type,
            self.description
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_wire_names_match_serde() {
        let all = [
            EventType::PhCriticalLow,
            EventType::PhCriticalHigh,
            EventType::PhLow,
            EventType::PhHigh,
            EventType::PhRapidChange,
            EventType::TurbidityCritical,
            EventType::TurbidityHigh,
            EventType::TurbiditySpike,
            EventType::TemperatureExtreme,
            EventType::TemperatureRapidChange,
            EventType::MultiParameterDegradation,
            EventType::SustainedPoorPh,
            EventType::IncreasingTurbidityTrend,
        ];
        for t in all {
            let json = serde_json::to_string(&t).expect("serializes");
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert_eq!("CRITICAL".parse::<Severity>(), Ok(Severity::Critical));
        assert!("bogus".parse::<Severity>().is_err());
    }
}
