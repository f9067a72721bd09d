//! Pollution Event Analyzer
//!
//! Stateful detection over the sample stream:
//!
//! 1. Present readings are appended to the per-parameter windows
//! 2. The rule table is evaluated against the sample and windows
//! 3. The cooldown filter drops recently repeated (type, severity) pairs
//!
//! The analyzer has a single owner. Callers that need the latest readings
//! from another task read the pipeline's status snapshot instead.

mod cooldown;
pub mod rules;
mod window;

pub use cooldown::CooldownFilter;
pub use rules::{Finding, Rule, RuleId, RULES};
pub use window::{InsufficientData, ParameterWindows, SampleWindow, WindowSummary};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};

use crate::config::AnalyzerConfig;
use crate::types::{Event, Parameter, Sample};

/// Failure of the strict analysis path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Non-finite {parameter} reading: {value}")]
    NonFiniteReading { parameter: Parameter, value: f64 },
}

/// Window statistics per parameter; `None` where no reading has been seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryStatistics {
    #[serde(rename = "pH", skip_serializing_if = "Option::is_none")]
    pub ph: Option<WindowSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turbidity: Option<WindowSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<WindowSummary>,
}

pub struct Analyzer {
    windows: ParameterWindows,
    cooldown: CooldownFilter,
    samples_analyzed: u64,
}

impl Analyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        debug!(
            history_capacity = config.history_capacity,
            cooldown_secs = config.cooldown_secs,
            "Water quality analyzer initialized"
        );
        Self {
            windows: ParameterWindows::new(config.history_capacity),
            cooldown: CooldownFilter::from_secs(config.cooldown_secs),
            samples_analyzed: 0,
        }
    }

    /// Analyze a sample at the current wall-clock time. Never fails.
    pub fn analyze(&mut self, sample: &Sample) -> Vec<Event> {
        self.analyze_at(sample, Utc::now())
    }

    /// Analyze with an explicit clock. Internal failures are logged and
    /// yield an empty list.
    pub fn analyze_at(&mut self, sample: &Sample, now: DateTime<Utc>) -> Vec<Event> {
        match self.try_analyze_at(sample, now) {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "Error analyzing water quality");
                Vec::new()
            }
        }
    }

    /// Strict analysis: distinguishes "nothing detected" from a rejected sample.
    ///
    /// A rejected sample leaves the windows and cooldown state untouched.
    pub fn try_analyze_at(
        &mut self,
        sample: &Sample,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, AnalysisError> {
        if let Some((parameter, value)) = sample.first_non_finite() {
            return Err(AnalysisError::NonFiniteReading { parameter, value });
        }

        self.windows.record(sample);
        self.samples_analyzed += 1;

        let candidates = rules::evaluate_all(sample, &self.windows, now);
        let candidate_count = candidates.len();
        let events = self.cooldown.filter(candidates, now);

        if candidate_count > 0 {
            debug!(
                candidates = candidate_count,
                emitted = events.len(),
                "Rule evaluation complete"
            );
        }
        Ok(events)
    }

    /// Current/mean/min/max of each window.
    pub fn statistics(&self) -> HistoryStatistics {
        HistoryStatistics {
            ph: self.windows.get(Parameter::Ph).summary(),
            turbidity: self.windows.get(Parameter::Turbidity).summary(),
            temperature: self.windows.get(Parameter::Temperature).summary(),
        }
    }

    pub fn window(&self, parameter: Parameter) -> &SampleWindow {
        self.windows.get(parameter)
    }

    pub fn cooldown(&self) -> &CooldownFilter {
        &self.cooldown
    }

    pub fn samples_analyzed(&self) -> u64 {
        self.samples_analyzed
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(&AnalyzerConfig::default())
    }
}
