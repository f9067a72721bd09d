//! Water Quality Classifier
//!
//! Bands each parameter against the configured ranges, takes the worst known
//! band as the overall class and computes a weighted 0-100 score.
//!
//! Boundary conventions differ per parameter and are part of the observable
//! behaviour: pH and temperature bands are closed (`low <= x <= high`),
//! turbidity bands are half-open (`low <= x < high`).

use tracing::error;

use crate::config::{BandTable, ThresholdConfig};
use crate::types::{Band, BandBreakdown, ClassificationResult, Parameter, Sample};

// ============================================================================
// Per-Parameter Conventions
// ============================================================================

/// How a configured `[low, high]` range is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalConvention {
    /// `low <= x <= high`
    Closed,
    /// `low <= x < high`
    HalfOpen,
}

impl IntervalConvention {
    pub fn contains(self, low: f64, high: f64, value: f64) -> bool {
        match self {
            IntervalConvention::Closed => low <= value && value <= high,
            IntervalConvention::HalfOpen => low <= value && value < high,
        }
    }
}

/// Band assigned when a reading falls outside every configured range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fallthrough {
    /// Critical outside `[low, high]` (strict), poor inside.
    AbsoluteLimits { low: f64, high: f64 },
    /// Always critical.
    Critical,
}

impl Fallthrough {
    fn band(self, value: f64) -> Band {
        match self {
            Fallthrough::AbsoluteLimits { low, high } if value < low || value > high => {
                Band::Critical
            }
            Fallthrough::AbsoluteLimits { .. } => Band::Poor,
            Fallthrough::Critical => Band::Critical,
        }
    }
}

/// Score weight of each parameter, in tenths.
const WEIGHT_TENTHS_PH: u32 = 4;
const WEIGHT_TENTHS_TURBIDITY: u32 = 4;
const WEIGHT_TENTHS_TEMPERATURE: u32 = 2;

impl Parameter {
    pub fn interval_convention(self) -> IntervalConvention {
        match self {
            Parameter::Ph | Parameter::Temperature => IntervalConvention::Closed,
            Parameter::Turbidity => IntervalConvention::HalfOpen,
        }
    }

    pub fn fallthrough(self) -> Fallthrough {
        match self {
            Parameter::Ph => Fallthrough::AbsoluteLimits { low: 5.0, high: 10.0 },
            Parameter::Temperature => Fallthrough::AbsoluteLimits { low: 0.0, high: 40.0 },
            Parameter::Turbidity => Fallthrough::Critical,
        }
    }
}

// ============================================================================
// Classifier
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifyError {
    #[error("Non-finite {parameter} reading: {value}")]
    NonFiniteReading { parameter: Parameter, value: f64 },
}

/// Stateless classifier built from the configured band table.
#[derive(Debug, Clone)]
pub struct Classifier {
    thresholds: ThresholdConfig,
}

impl Classifier {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Classify a sample. Internal failures are logged and yield
    /// `ClassificationResult::unknown()`.
    pub fn classify(&self, sample: &Sample) -> ClassificationResult {
        match self.try_classify(sample) {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Error classifying water quality");
                ClassificationResult::unknown()
            }
        }
    }

    /// Strict classification; rejects NaN and infinite readings.
    pub fn try_classify(&self, sample: &Sample) -> Result<ClassificationResult, ClassifyError> {
        if let Some((parameter, value)) = sample.first_non_finite() {
            return Err(ClassifyError::NonFiniteReading { parameter, value });
        }

        let details = BandBreakdown {
            ph: self.classify_parameter(Parameter::Ph, sample.ph),
            turbidity: self.classify_parameter(Parameter::Turbidity, sample.turbidity),
            temperature: self.classify_parameter(Parameter::Temperature, sample.temperature),
        };

        Ok(ClassificationResult {
            band: Band::worst_of(&[details.ph, details.turbidity, details.temperature]),
            score: score(&details),
            details: Some(details),
        })
    }

    /// Band for one reading. Absent readings are `Unknown`.
    pub fn classify_parameter(&self, parameter: Parameter, value: Option<f64>) -> Band {
        let Some(value) = value else {
            return Band::Unknown;
        };
        let convention = parameter.interval_convention();
        let matched = named_bands(self.table(parameter))
            .into_iter()
            .find(|(_, range)| convention.contains(range.low(), range.high(), value))
            .map(|(band, _)| band);
        matched.unwrap_or_else(|| parameter.fallthrough().band(value))
    }

    fn table(&self, parameter: Parameter) -> BandTable {
        match parameter {
            Parameter::Ph => self.thresholds.ph.table(),
            Parameter::Turbidity => self.thresholds.turbidity.table(),
            Parameter::Temperature => self.thresholds.temperature.table(),
        }
    }
}

fn named_bands(table: BandTable) -> Vec<(Band, crate::config::BandRange)> {
    let mut bands = vec![
        (Band::Excellent, table.excellent),
        (Band::Good, table.good),
        (Band::Fair, table.fair),
    ];
    if let Some(poor) = table.poor {
        bands.push((Band::Poor, poor));
    }
    bands
}

/// `floor(0.4·pH + 0.4·turbidity + 0.2·temperature)`; unknown counts as 0.
fn score(details: &BandBreakdown) -> u8 {
    let weighted = WEIGHT_TENTHS_PH * details.ph.points()
        + WEIGHT_TENTHS_TURBIDITY * details.turbidity.points()
        + WEIGHT_TENTHS_TEMPERATURE * details.temperature.points();
    // at most 100 since the weights sum to ten tenths
    u8::try_from(weighted / 10).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(ThresholdConfig::default())
    }

    #[test]
    fn test_all_excellent_scores_100() {
        let r = classifier().classify(&Sample::new(Some(7.2), Some(3.0), Some(20.0)));
        assert_eq!(r.band, Band::Excellent);
        assert_eq!(r.score, 100);
    }

    #[test]
    fn test_missing_turbidity_scores_zero_weight() {
        let r = classifier().classify(&Sample::new(Some(7.2), None, Some(20.0)));
        let details = r.details.expect("details present");
        assert_eq!(details.turbidity, Band::Unknown);
        assert_eq!(r.band, Band::Excellent);
        assert_eq!(r.score, 60);
    }

    #[test]
    fn test_all_missing_is_unknown() {
        let r = classifier().classify(&Sample::default());
        assert_eq!(r.band, Band::Unknown);
        assert_eq!(r.score, 0);
        assert!(r.details.is_some());
    }

    #[test]
    fn test_ph_closed_intervals() {
        let c = classifier();
        assert_eq!(c.classify_parameter(Parameter::Ph, Some(8.5)), Band::Excellent);
        assert_eq!(c.classify_parameter(Parameter::Ph, Some(9.0)), Band::Good);
        assert_eq!(c.classify_parameter(Parameter::Ph, Some(9.5)), Band::Fair);
        assert_eq!(c.classify_parameter(Parameter::Ph, Some(9.6)), Band::Poor);
        assert_eq!(c.classify_parameter(Parameter::Ph, Some(10.0)), Band::Poor);
        assert_eq!(c.classify_parameter(Parameter::Ph, Some(10.1)), Band::Critical);
        assert_eq!(c.classify_parameter(Parameter::Ph, Some(5.0)), Band::Poor);
        assert_eq!(c.classify_parameter(Parameter::Ph, Some(4.9)), Band::Critical);
    }

    #[test]
    fn test_turbidity_half_open_intervals() {
        let c = classifier();
        assert_eq!(c.classify_parameter(Parameter::Turbidity, Some(0.0)), Band::Excellent);
        assert_eq!(c.classify_parameter(Parameter::Turbidity, Some(5.0)), Band::Good);
        assert_eq!(c.classify_parameter(Parameter::Turbidity, Some(10.0)), Band::Fair);
        assert_eq!(c.classify_parameter(Parameter::Turbidity, Some(25.0)), Band::Poor);
        assert_eq!(c.classify_parameter(Parameter::Turbidity, Some(99.9)), Band::Poor);
        assert_eq!(c.classify_parameter(Parameter::Turbidity, Some(100.0)), Band::Critical);
        assert_eq!(c.classify_parameter(Parameter::Turbidity, Some(-1.0)), Band::Critical);
    }

    #[test]
    fn test_temperature_fallthrough() {
        let c = classifier();
        assert_eq!(c.classify_parameter(Parameter::Temperature, Some(35.0)), Band::Fair);
        assert_eq!(c.classify_parameter(Parameter::Temperature, Some(38.0)), Band::Poor);
        assert_eq!(c.classify_parameter(Parameter::Temperature, Some(40.0)), Band::Poor);
        assert_eq!(c.classify_parameter(Parameter::Temperature, Some(40.5)), Band::Critical);
        assert_eq!(c.classify_parameter(Parameter::Temperature, Some(-0.1)), Band::Critical);
    }

    #[test]
    fn test_worst_band_wins() {
        let r = classifier().classify(&Sample::new(Some(7.2), Some(30.0), Some(20.0)));
        assert_eq!(r.band, Band::Poor);
        // 0.4*100 + 0.4*40 + 0.2*100
        assert_eq!(r.score, 76);
    }

    #[test]
    fn test_score_floors() {
        // good pH (80), fair turbidity (60), poor temperature (40): 32 + 24 + 8 = 64
        let r = classifier().classify(&Sample::new(Some(6.2), Some(12.0), Some(37.0)));
        assert_eq!(r.score, 64);
        // fair pH (60), unknown turbidity, good temperature (80): 24 + 0 + 16 = 40
        let r = classifier().classify(&Sample::new(Some(5.8), None, Some(12.0)));
        assert_eq!(r.score, 40);
    }

    #[test]
    fn test_non_finite_is_fail_soft() {
        let c = classifier();
        let s = Sample::new(Some(f64::INFINITY), Some(3.0), Some(20.0));
        assert!(c.try_classify(&s).is_err());
        assert_eq!(c.classify(&s), ClassificationResult::unknown());
    }

    #[test]
    fn test_conventions_are_named_per_parameter() {
        assert_eq!(Parameter::Ph.interval_convention(), IntervalConvention::Closed);
        assert_eq!(Parameter::Temperature.interval_convention(), IntervalConvention::Closed);
        assert_eq!(Parameter::Turbidity.interval_convention(), IntervalConvention::HalfOpen);
        assert_eq!(Parameter::Turbidity.fallthrough(), Fallthrough::Critical);
    }
}
