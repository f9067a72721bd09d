//! Bounded per-parameter history

use serde::Serialize;
use std::collections::VecDeque;

use crate::types::{Parameter, Sample};

/// Returned by [`SampleWindow::snapshot`] when fewer values exist than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Insufficient data: need {needed}, have {available}")]
pub struct InsufficientData {
    pub needed: usize,
    pub available: usize,
}

/// Windows larger than this grow on demand instead of allocating up front.
const PREALLOCATE_LIMIT: usize = 1024;

/// Fixed-capacity FIFO of readings for one parameter, oldest first.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity.min(PREALLOCATE_LIMIT)),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest when full.
    pub fn append(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// The last `k` readings in chronological order.
    pub fn snapshot(&self, k: usize) -> Result<Vec<f64>, InsufficientData> {
        let available = self.values.len();
        if available < k {
            return Err(InsufficientData {
                needed: k,
                available,
            });
        }
        Ok(self.values.iter().skip(available - k).copied().collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// All retained readings, oldest first.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// Current/mean/min/max over the retained readings. `None` when empty.
    pub fn summary(&self) -> Option<WindowSummary> {
        let current = self.latest()?;
        let count = self.values.len();
        let (sum, min, max) = self.values.iter().fold(
            (0.0, f64::INFINITY, f64::NEG_INFINITY),
            |(sum, min, max), &v| (sum + v, min.min(v), max.max(v)),
        );
        Some(WindowSummary {
            current,
            mean: sum / count as f64,
            min,
            max,
            count,
        })
    }
}

/// One window per monitored parameter.
#[derive(Debug, Clone)]
pub struct ParameterWindows {
    ph: SampleWindow,
    turbidity: SampleWindow,
    temperature: SampleWindow,
}

impl ParameterWindows {
    pub fn new(capacity: usize) -> Self {
        Self {
            ph: SampleWindow::new(capacity),
            turbidity: SampleWindow::new(capacity),
            temperature: SampleWindow::new(capacity),
        }
    }

    pub fn get(&self, parameter: Parameter) -> &SampleWindow {
        match parameter {
            Parameter::Ph => &self.ph,
            Parameter::Turbidity => &self.turbidity,
            Parameter::Temperature => &self.temperature,
        }
    }

    fn get_mut(&mut self, parameter: Parameter) -> &mut SampleWindow {
        match parameter {
            Parameter::Ph => &mut self.ph,
            Parameter::Turbidity => &mut self.turbidity,
            Parameter::Temperature => &mut self.temperature,
        }
    }

    /// Append every present reading of `sample`; absent parameters are skipped.
    pub fn record(&mut self, sample: &Sample) {
        for parameter in Parameter::ALL {
            if let Some(value) = sample.get(parameter) {
                self.get_mut(parameter).append(value);
            }
        }
    }
}

/// Descriptive statistics for one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowSummary {
    pub current: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Spread (max - min) of a slice. Zero for an empty slice.
pub(crate) fn range_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    max - min
}

/// Arithmetic mean of a slice. Zero for an empty slice.
pub(crate) fn mean_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut w = SampleWindow::new(60);
        for i in 0..150 {
            w.append(i as f64);
            assert!(w.len() <= 60);
        }
        let snap = w.snapshot(60).expect("full window");
        let expected: Vec<f64> = (90..150).map(|i| i as f64).collect();
        assert_eq!(snap, expected);
    }

    #[test]
    fn test_huge_capacity_allocates_lazily() {
        let mut w = SampleWindow::new(usize::MAX);
        assert_eq!(w.capacity(), usize::MAX);
        w.append(7.0);
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn test_snapshot_insufficient() {
        let mut w = SampleWindow::new(60);
        w.append(1.0);
        w.append(2.0);
        let err = w.snapshot(6).unwrap_err();
        assert_eq!(err, InsufficientData { needed: 6, available: 2 });
        assert_eq!(err.to_string(), "Insufficient data: need 6, have 2");
    }

    #[test]
    fn test_snapshot_returns_tail_in_order() {
        let mut w = SampleWindow::new(10);
        for v in [1.0, 2.0, 3.0, 4.0] {
            w.append(v);
        }
        assert_eq!(w.snapshot(2).unwrap(), vec![3.0, 4.0]);
        assert_eq!(w.snapshot(0).unwrap(), Vec::<f64>::new());
        assert_eq!(w.latest(), Some(4.0));
    }

    #[test]
    fn test_summary() {
        let mut w = SampleWindow::new(10);
        assert!(w.summary().is_none());
        for v in [7.0, 6.0, 8.0] {
            w.append(v);
        }
        let s = w.summary().unwrap();
        assert_eq!(s.current, 8.0);
        assert_eq!(s.min, 6.0);
        assert_eq!(s.max, 8.0);
        assert!((s.mean - 7.0).abs() < 1e-12);
        assert_eq!(s.count, 3);
    }

    #[test]
    fn test_record_skips_absent_parameters() {
        let mut windows = ParameterWindows::new(60);
        windows.record(&Sample::new(Some(7.0), None, Some(20.0)));
        windows.record(&Sample::new(Some(7.1), Some(4.0), None));
        assert_eq!(windows.get(Parameter::Ph).len(), 2);
        assert_eq!(windows.get(Parameter::Turbidity).len(), 1);
        assert_eq!(windows.get(Parameter::Temperature).len(), 1);
    }

    #[test]
    fn test_range_and_mean_helpers() {
        assert_eq!(range_of(&[]), 0.0);
        assert!((range_of(&[7.0, 7.6, 7.1]) - 0.6).abs() < 1e-12);
        assert_eq!(mean_of(&[10.0, 20.0]), 15.0);
    }
}
