//! Water samples as produced by the sensor-reading collaborator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Measured water parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parameter {
    #[serde(rename = "pH")]
    Ph,
    #[serde(rename = "turbidity")]
    Turbidity,
    #[serde(rename = "temperature")]
    Temperature,
}

impl Parameter {
    /// All parameters in reporting order.
    pub const ALL: [Parameter; 3] = [Parameter::Ph, Parameter::Turbidity, Parameter::Temperature];

    /// Wire / column name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::Ph => "pH",
            Parameter::Turbidity => "turbidity",
            Parameter::Temperature => "temperature",
        }
    }

    /// Display unit suffix.
    pub fn unit(&self) -> &'static str {
        match self {
            Parameter::Ph => "",
            Parameter::Turbidity => " NTU",
            Parameter::Temperature => "°C",
        }
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One multi-parameter reading.
///
/// Every field is optional: `None` means the read for that parameter failed,
/// which is distinct from a reading of zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Acidity, 0-14
    #[serde(rename = "pH", default)]
    pub ph: Option<f64>,
    /// Turbidity in NTU
    #[serde(default)]
    pub turbidity: Option<f64>,
    /// Water temperature in °C
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    /// Create a sample stamped with the current time.
    pub fn new(ph: Option<f64>, turbidity: Option<f64>, temperature: Option<f64>) -> Self {
        Self::at(ph, turbidity, temperature, Utc::now())
    }

    /// Create a sample with an explicit timestamp.
    pub fn at(
        ph: Option<f64>,
        turbidity: Option<f64>,
        temperature: Option<f64>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            ph,
            turbidity,
            temperature,
            timestamp,
        }
    }

    /// Value for a single parameter.
    pub fn get(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::Ph => self.ph,
            Parameter::Turbidity => self.turbidity,
            Parameter::Temperature => self.temperature,
        }
    }

    /// True when every sensor read failed.
    pub fn is_empty(&self) -> bool {
        self.ph.is_none() && self.turbidity.is_none() && self.temperature.is_none()
    }

    /// First parameter carrying a NaN or infinite value, if any.
    pub fn first_non_finite(&self) -> Option<(Parameter, f64)> {
        Parameter::ALL.into_iter().find_map(|p| {
            self.get(p)
                .filter(|v| !v.is_finite())
                .map(|v| (p, v))
        })
    }
}

impl Default for Sample {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

impl std::fmt::Display for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn fmt_opt(v: Option<f64>, precision: usize) -> String {
            v.map_or_else(|| "N/A".to_string(), |v| format!("{v:.precision$}"))
        }
        write!(
            f,
            "pH={}, Turbidity={} NTU, Temp={}°C",
            fmt_opt(self.ph, 2),
            fmt_opt(self.turbidity, 1),
            fmt_opt(self.temperature, 1)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_is_not_zero() {
        let s = Sample::new(Some(0.0), None, Some(0.0));
        assert_eq!(s.ph, Some(0.0));
        assert_eq!(s.turbidity, None);
        assert!(!s.is_empty());
    }

    #[test]
    fn test_json_field_names() {
        let s: Sample =
            serde_json::from_str(r#"{"pH": 7.1, "temperature": 18.5}"#).expect("valid json");
        assert_eq!(s.ph, Some(7.1));
        assert_eq!(s.turbidity, None);
        assert_eq!(s.temperature, Some(18.5));

        let out = serde_json::to_value(&s).expect("serializes");
        assert_eq!(out["pH"], 7.1);
        assert!(out["turbidity"].is_null());
    }

    #[test]
    fn test_first_non_finite() {
        let s = Sample::new(Some(7.0), Some(f64::NAN), Some(f64::INFINITY));
        let (param, _) = s.first_non_finite().expect("NaN present");
        assert_eq!(param, Parameter::Turbidity);
        assert!(Sample::new(Some(7.0), None, Some(20.0)).first_non_finite().is_none());
    }

    #[test]
    fn test_display_marks_missing() {
        let s = Sample::new(Some(7.2), None, Some(20.0));
        assert_eq!(s.to_string(), "pH=7.20, Turbidity=N/A NTU, Temp=20.0°C");
    }
}
