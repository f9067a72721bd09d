//! Pollution detection rules
//!
//! Each rule is a pure function over the current sample and the parameter
//! windows (which already contain that sample). Rules are independent: any
//! subset may fire on one sample. Evaluation order is the table order and
//! determines the order of emitted events.
//!
//! Absolute thresholds here are fixed; only classifier bands are configurable.

use chrono::{DateTime, Utc};

use super::window::{mean_of, range_of, ParameterWindows};
use crate::types::{Event, EventType, Parameter, Sample, Severity};

// ============================================================================
// Thresholds
// ============================================================================

/// pH absolute limits
pub mod ph {
    pub const CRITICAL_LOW: f64 = 5.0;
    pub const CRITICAL_HIGH: f64 = 10.0;
    pub const LOW: f64 = 5.5;
    pub const HIGH: f64 = 9.5;
    /// Max-min spread over the rapid-change horizon (pH units)
    pub const RAPID_CHANGE: f64 = 0.5;
    /// Acceptable range used by the sustained-poor trend
    pub const ACCEPTABLE_LOW: f64 = 6.5;
    pub const ACCEPTABLE_HIGH: f64 = 8.5;
    /// Readings outside the acceptable range (of the trend horizon) to fire
    pub const SUSTAINED_POOR_COUNT: usize = 20;
}

/// Turbidity absolute limits (NTU)
pub mod turbidity {
    pub const CRITICAL: f64 = 100.0;
    pub const HIGH: f64 = 25.0;
    /// Relative increase over the preceding mean that counts as a spike
    pub const SPIKE_RATIO: f64 = 0.5;
    /// Second-half mean must exceed first-half mean by this factor
    pub const TREND_FACTOR: f64 = 1.5;
}

/// Temperature absolute limits (°C)
pub mod temperature {
    pub const EXTREME_LOW: f64 = 0.0;
    pub const EXTREME_HIGH: f64 = 40.0;
    /// Max-min spread over the rapid-change horizon (°C)
    pub const RAPID_CHANGE: f64 = 5.0;
}

/// Per-parameter degradation limits for the combined rule
pub mod combined {
    pub const PH_LOW: f64 = 6.0;
    pub const PH_HIGH: f64 = 9.0;
    pub const TURBIDITY_HIGH: f64 = 25.0;
    pub const TEMPERATURE_LOW: f64 = 10.0;
    pub const TEMPERATURE_HIGH: f64 = 30.0;
    /// Degraded parameters needed to fire
    pub const MIN_DEGRADED: usize = 2;
}

/// Samples inspected by the rapid-change and spike rules (one minute at 10 s).
pub const SHORT_HORIZON: usize = 6;

/// Samples inspected by the trend rules (five minutes at 10 s).
pub const TREND_HORIZON: usize = 30;

// ============================================================================
// Rule Table
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleId {
    PhAbsolute,
    PhRapidChange,
    TurbidityAbsolute,
    TurbiditySpike,
    TemperatureExtreme,
    TemperatureRapidChange,
    CombinedDegradation,
    SustainedPoorPh,
    IncreasingTurbidityTrend,
}

/// Inputs visible to a rule.
pub struct RuleContext<'a> {
    pub sample: &'a Sample,
    pub windows: &'a ParameterWindows,
}

/// What a rule reports when it fires.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub event_type: EventType,
    pub severity: Severity,
    pub description: String,
    /// Whether the event carries the sample's readings.
    pub echo_readings: bool,
}

impl Finding {
    fn echoed(event_type: EventType, severity: Severity, description: String) -> Self {
        Self {
            event_type,
            severity,
            description,
            echo_readings: true,
        }
    }

    fn bare(event_type: EventType, severity: Severity, description: &str) -> Self {
        Self {
            event_type,
            severity,
            description: description.to_string(),
            echo_readings: false,
        }
    }

    fn into_event(self, sample: &Sample, now: DateTime<Utc>) -> Event {
        let (ph, turbidity, temperature) = if self.echo_readings {
            (sample.ph, sample.turbidity, sample.temperature)
        } else {
            (None, None, None)
        };
        Event {
            event_type: self.event_type,
            severity: self.severity,
            description: self.description,
            ph,
            turbidity,
            temperature,
            timestamp: now,
        }
    }
}

pub struct Rule {
    pub id: RuleId,
    /// Parameter the current sample must carry for the rule to run.
    pub requires: Option<Parameter>,
    /// Window that must hold at least this many readings.
    pub min_history: Option<(Parameter, usize)>,
    pub evaluate: fn(&RuleContext<'_>) -> Option<Finding>,
}

impl Rule {
    fn is_active(&self, ctx: &RuleContext<'_>) -> bool {
        let present = self
            .requires
            .map_or(true, |p| ctx.sample.get(p).is_some());
        let enough_history = self
            .min_history
            .map_or(true, |(p, n)| ctx.windows.get(p).len() >= n);
        present && enough_history
    }
}

/// All rules in evaluation order.
pub static RULES: [Rule; 9] = [
    Rule {
        id: RuleId::PhAbsolute,
        requires: Some(Parameter::Ph),
        min_history: None,
        evaluate: ph_absolute,
    },
    Rule {
        id: RuleId::PhRapidChange,
        requires: Some(Parameter::Ph),
        min_history: Some((Parameter::Ph, SHORT_HORIZON)),
        evaluate: ph_rapid_change,
    },
    Rule {
        id: RuleId::TurbidityAbsolute,
        requires: Some(Parameter::Turbidity),
        min_history: None,
        evaluate: turbidity_absolute,
    },
    Rule {
        id: RuleId::TurbiditySpike,
        requires: Some(Parameter::Turbidity),
        min_history: Some((Parameter::Turbidity, SHORT_HORIZON)),
        evaluate: turbidity_spike,
    },
    Rule {
        id: RuleId::TemperatureExtreme,
        requires: Some(Parameter::Temperature),
        min_history: None,
        evaluate: temperature_extreme,
    },
    Rule {
        id: RuleId::TemperatureRapidChange,
        requires: Some(Parameter::Temperature),
        min_history: Some((Parameter::Temperature, SHORT_HORIZON)),
        evaluate: temperature_rapid_change,
    },
    Rule {
        id: RuleId::CombinedDegradation,
        requires: None,
        min_history: None,
        evaluate: combined_degradation,
    },
    Rule {
        id: RuleId::SustainedPoorPh,
        requires: None,
        min_history: Some((Parameter::Ph, TREND_HORIZON)),
        evaluate: sustained_poor_ph,
    },
    Rule {
        id: RuleId::IncreasingTurbidityTrend,
        requires: None,
        min_history: Some((Parameter::Turbidity, TREND_HORIZON)),
        evaluate: increasing_turbidity_trend,
    },
];

/// Run every active rule and build candidate events stamped with `now`.
pub fn evaluate_all(
    sample: &Sample,
    windows: &ParameterWindows,
    now: DateTime<Utc>,
) -> Vec<Event> {
    let ctx = RuleContext { sample, windows };
    RULES
        .iter()
        .filter(|rule| rule.is_active(&ctx))
        .filter_map(|rule| (rule.evaluate)(&ctx))
        .map(|finding| finding.into_event(sample, now))
        .collect()
}

// ============================================================================
// pH
// ============================================================================

fn ph_absolute(ctx: &RuleContext<'_>) -> Option<Finding> {
    let v = ctx.sample.ph?;
    if v < ph::CRITICAL_LOW {
        Some(Finding::echoed(
            EventType::PhCriticalLow,
            Severity::Critical,
            format!("Critical acidic pH detected: {v:.2} (Possible industrial discharge)"),
        ))
    } else if v > ph::CRITICAL_HIGH {
        Some(Finding::echoed(
            EventType::PhCriticalHigh,
            Severity::Critical,
            format!("Critical alkaline pH detected: {v:.2} (Possible chemical spill)"),
        ))
    } else if v < ph::LOW {
        Some(Finding::echoed(
            EventType::PhLow,
            Severity::Warning,
            format!("Acidic pH detected: {v:.2}"),
        ))
    } else if v > ph::HIGH {
        Some(Finding::echoed(
            EventType::PhHigh,
            Severity::Warning,
            format!("Alkaline pH detected: {v:.2}"),
        ))
    } else {
        None
    }
}

fn ph_rapid_change(ctx: &RuleContext<'_>) -> Option<Finding> {
    let recent = ctx.windows.get(Parameter::Ph).snapshot(SHORT_HORIZON).ok()?;
    let change = range_of(&recent);
    (change > ph::RAPID_CHANGE).then(|| {
        Finding::echoed(
            EventType::PhRapidChange,
            Severity::Warning,
            format!("Rapid pH change detected: {change:.2} units in 1 minute"),
        )
    })
}

// ============================================================================
// Turbidity
// ============================================================================

fn turbidity_absolute(ctx: &RuleContext<'_>) -> Option<Finding> {
    let v = ctx.sample.turbidity?;
    if v > turbidity::CRITICAL {
        Some(Finding::echoed(
            EventType::TurbidityCritical,
            Severity::Critical,
            format!("Critical turbidity level: {v:.1} NTU (Possible sediment spill or algae bloom)"),
        ))
    } else if v > turbidity::HIGH {
        Some(Finding::echoed(
            EventType::TurbidityHigh,
            Severity::Warning,
            format!("High turbidity detected: {v:.1} NTU"),
        ))
    } else {
        None
    }
}

fn turbidity_spike(ctx: &RuleContext<'_>) -> Option<Finding> {
    let current = ctx.sample.turbidity?;
    let recent = ctx
        .windows
        .get(Parameter::Turbidity)
        .snapshot(SHORT_HORIZON)
        .ok()?;
    let previous_mean = mean_of(&recent[..recent.len() - 1]);
    if previous_mean <= 0.0 {
        return None;
    }
    let increase = (current - previous_mean) / previous_mean;
    (increase > turbidity::SPIKE_RATIO).then(|| {
        Finding::echoed(
            EventType::TurbiditySpike,
            Severity::Warning,
            format!("Turbidity spike detected: {:.0}% increase", increase * 100.0),
        )
    })
}

// ============================================================================
// Temperature
// ============================================================================

fn temperature_extreme(ctx: &RuleContext<'_>) -> Option<Finding> {
    let v = ctx.sample.temperature?;
    (v < temperature::EXTREME_LOW || v > temperature::EXTREME_HIGH).then(|| {
        Finding::echoed(
            EventType::TemperatureExtreme,
            Severity::Critical,
            format!("Extreme water temperature: {v:.1}°C"),
        )
    })
}

fn temperature_rapid_change(ctx: &RuleContext<'_>) -> Option<Finding> {
    let recent = ctx
        .windows
        .get(Parameter::Temperature)
        .snapshot(SHORT_HORIZON)
        .ok()?;
    let change = range_of(&recent);
    (change > temperature::RAPID_CHANGE).then(|| {
        Finding::echoed(
            EventType::TemperatureRapidChange,
            Severity::Warning,
            format!("Rapid temperature change: {change:.1}°C in 1 minute (Possible thermal pollution)"),
        )
    })
}

// ============================================================================
// Cross-parameter
// ============================================================================

fn combined_degradation(ctx: &RuleContext<'_>) -> Option<Finding> {
    let (ph, turb, temp) = (
        ctx.sample.ph?,
        ctx.sample.turbidity?,
        ctx.sample.temperature?,
    );
    let degraded = [
        ph < combined::PH_LOW || ph > combined::PH_HIGH,
        turb > combined::TURBIDITY_HIGH,
        temp < combined::TEMPERATURE_LOW || temp > combined::TEMPERATURE_HIGH,
    ]
    .iter()
    .filter(|&&d| d)
    .count();

    (degraded >= combined::MIN_DEGRADED).then(|| {
        Finding::echoed(
            EventType::MultiParameterDegradation,
            Severity::Critical,
            format!("Multiple parameters degraded: pH={ph:.2}, Turbidity={turb:.1}NTU, Temp={temp:.1}°C"),
        )
    })
}

// ============================================================================
// Trends
// ============================================================================

fn sustained_poor_ph(ctx: &RuleContext<'_>) -> Option<Finding> {
    let recent = ctx.windows.get(Parameter::Ph).snapshot(TREND_HORIZON).ok()?;
    let outside = recent
        .iter()
        .filter(|&&v| v < ph::ACCEPTABLE_LOW || v > ph::ACCEPTABLE_HIGH)
        .count();
    (outside > ph::SUSTAINED_POOR_COUNT).then(|| {
        Finding::bare(
            EventType::SustainedPoorPh,
            Severity::Warning,
            "pH outside acceptable range for extended period",
        )
    })
}

fn increasing_turbidity_trend(ctx: &RuleContext<'_>) -> Option<Finding> {
    let recent = ctx
        .windows
        .get(Parameter::Turbidity)
        .snapshot(TREND_HORIZON)
        .ok()?;
    let (first, second) = recent.split_at(TREND_HORIZON / 2);
    (mean_of(second) > mean_of(first) * turbidity::TREND_FACTOR).then(|| {
        Finding::bare(
            EventType::IncreasingTurbidityTrend,
            Severity::Info,
            "Turbidity showing increasing trend",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows_after(samples: &[Sample]) -> ParameterWindows {
        let mut windows = ParameterWindows::new(60);
        for s in samples {
            windows.record(s);
        }
        windows
    }

    fn types_for(history: &[Sample]) -> Vec<EventType> {
        let windows = windows_after(history);
        let current = history.last().expect("non-empty history");
        evaluate_all(current, &windows, Utc::now())
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    #[test]
    fn test_rule_table_order() {
        let ids: Vec<RuleId> = RULES.iter().map(|r| r.id).collect();
        assert_eq!(ids.first(), Some(&RuleId::PhAbsolute));
        assert_eq!(ids.last(), Some(&RuleId::IncreasingTurbidityTrend));
        assert_eq!(ids.len(), 9);
    }

    #[test]
    fn test_ph_boundaries_are_strict() {
        assert_eq!(types_for(&[Sample::new(Some(5.0), None, None)]), vec![EventType::PhLow]);
        assert_eq!(types_for(&[Sample::new(Some(10.0), None, None)]), vec![EventType::PhHigh]);
        assert_eq!(
            types_for(&[Sample::new(Some(4.99), None, None)]),
            vec![EventType::PhCriticalLow]
        );
        assert!(types_for(&[Sample::new(Some(5.5), None, None)]).is_empty());
        assert!(types_for(&[Sample::new(Some(9.5), None, None)]).is_empty());
    }

    #[test]
    fn test_ph_rapid_change_alongside_absolute() {
        let mut history: Vec<Sample> = (0..5).map(|_| Sample::new(Some(7.0), None, None)).collect();
        history.push(Sample::new(Some(4.0), None, None));
        assert_eq!(
            types_for(&history),
            vec![EventType::PhCriticalLow, EventType::PhRapidChange]
        );
    }

    #[test]
    fn test_rapid_change_needs_current_reading() {
        let mut history: Vec<Sample> = (0..5).map(|_| Sample::new(Some(7.0), None, None)).collect();
        history.push(Sample::new(Some(8.0), None, None));
        history.push(Sample::new(None, Some(3.0), None));
        assert!(types_for(&history).is_empty());
    }

    #[test]
    fn test_turbidity_spike_threshold() {
        let mut history: Vec<Sample> = (0..5).map(|_| Sample::new(None, Some(10.0), None)).collect();
        history.push(Sample::new(None, Some(16.0), None));
        let windows = windows_after(&history);
        let events = evaluate_all(&history[5], &windows, Utc::now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::TurbiditySpike);
        assert_eq!(events[0].description, "Turbidity spike detected: 60% increase");

        history[5] = Sample::new(None, Some(14.0), None);
        assert!(types_for(&history).is_empty());
    }

    #[test]
    fn test_spike_skipped_for_zero_baseline() {
        let mut history: Vec<Sample> = (0..5).map(|_| Sample::new(None, Some(0.0), None)).collect();
        history.push(Sample::new(None, Some(5.0), None));
        assert!(types_for(&history).is_empty());
    }

    #[test]
    fn test_temperature_rules() {
        assert_eq!(
            types_for(&[Sample::new(None, None, Some(-0.5))]),
            vec![EventType::TemperatureExtreme]
        );
        assert!(types_for(&[Sample::new(None, None, Some(40.0))]).is_empty());

        let mut history: Vec<Sample> = (0..5).map(|_| Sample::new(None, None, Some(20.0))).collect();
        history.push(Sample::new(None, None, Some(26.0)));
        assert_eq!(types_for(&history), vec![EventType::TemperatureRapidChange]);
    }

    #[test]
    fn test_combined_requires_all_three() {
        let events = types_for(&[Sample::new(Some(8.0), Some(30.0), Some(35.0))]);
        assert!(events.contains(&EventType::MultiParameterDegradation));

        let events = types_for(&[Sample::new(None, Some(30.0), Some(35.0))]);
        assert!(!events.contains(&EventType::MultiParameterDegradation));
    }

    #[test]
    fn test_sustained_poor_ph_needs_more_than_twenty() {
        let mut history: Vec<Sample> = (0..9).map(|_| Sample::new(Some(7.0), None, None)).collect();
        history.extend((0..21).map(|_| Sample::new(Some(6.2), None, None)));
        let events = types_for(&history);
        assert_eq!(events, vec![EventType::SustainedPoorPh]);

        let mut history: Vec<Sample> = (0..10).map(|_| Sample::new(Some(7.0), None, None)).collect();
        history.extend((0..20).map(|_| Sample::new(Some(6.2), None, None)));
        assert!(types_for(&history).is_empty());
    }

    #[test]
    fn test_trend_events_carry_no_readings() {
        let mut history: Vec<Sample> = (0..15).map(|_| Sample::new(None, Some(2.0), None)).collect();
        history.extend((0..15).map(|_| Sample::new(None, Some(4.0), None)));
        let windows = windows_after(&history);
        let events = evaluate_all(&history[29], &windows, Utc::now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::IncreasingTurbidityTrend);
        assert_eq!(events[0].severity, Severity::Info);
        assert!(events[0].turbidity.is_none());
    }
}
