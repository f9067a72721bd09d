//! Unified sample processing loop shared across all input modes.
//!
//! The loop is the single owner of the [`Analyzer`]; everything else sees
//! the [`AppState`] snapshot it publishes after each sample.

use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::source::{SampleEvent, SampleSource};
use super::{AppState, SystemStatus};
use crate::alerts::{Alert, AlertDispatcher};
use crate::analyzer::Analyzer;
use crate::classifier::Classifier;
use crate::config::defaults::PROGRESS_LOG_EVERY;
use crate::storage::MonitorStorage;
use crate::types::{ClassificationResult, Event, Sample};

// ============================================================================
// Loop Statistics
// ============================================================================

/// Totals reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub samples_processed: u64,
    pub empty_samples: u64,
    pub events_detected: u64,
    pub alerts_sent: u64,
    pub sensor_failure_alerts: u64,
    pub storage_errors: u64,
}

impl std::fmt::Display for LoopStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} samples ({} empty), {} events, {} alerts sent, {} sensor failure alerts",
            self.samples_processed,
            self.empty_samples,
            self.events_detected,
            self.alerts_sent,
            self.sensor_failure_alerts
        )
    }
}

/// Which instant the cooldown filter compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisClock {
    /// Wall-clock time when the sample is processed
    WallClock,
    /// The sample's own timestamp (replay)
    SampleTime,
}

// ============================================================================
// Monitor Loop
// ============================================================================

/// Owns all state needed for the per-sample monitoring loop.
///
/// Built with [`new()`](MonitorLoop::new), optionally given storage, then
/// consumed by [`run()`](MonitorLoop::run).
pub struct MonitorLoop {
    analyzer: Analyzer,
    classifier: Classifier,
    storage: Option<MonitorStorage>,
    dispatcher: AlertDispatcher,
    app_state: Arc<RwLock<AppState>>,
    cancel_token: CancellationToken,
    max_consecutive_failures: u32,
    clock: AnalysisClock,
}

impl MonitorLoop {
    pub fn new(
        analyzer: Analyzer,
        classifier: Classifier,
        dispatcher: AlertDispatcher,
        app_state: Arc<RwLock<AppState>>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            analyzer,
            classifier,
            storage: None,
            dispatcher,
            app_state,
            cancel_token,
            max_consecutive_failures: 5,
            clock: AnalysisClock::WallClock,
        }
    }

    /// Persist readings and events.
    pub fn with_storage(mut self, storage: MonitorStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max.max(1);
        self
    }

    pub fn with_clock(mut self, clock: AnalysisClock) -> Self {
        self.clock = clock;
        self
    }

    /// Run until the source is exhausted or cancellation.
    ///
    /// Returns final loop statistics.
    pub async fn run<S: SampleSource>(mut self, source: &mut S) -> LoopStats {
        let mut stats = LoopStats::default();
        let mut consecutive_failures = 0u32;

        info!(source = source.source_name(), "Monitoring water quality");

        loop {
            let event = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("[MonitorLoop] Shutdown signal received");
                    break;
                }
                result = source.next_sample() => {
                    match result {
                        Ok(ev) => ev,
                        Err(e) => {
                            warn!(error = %e, "[MonitorLoop] Source error");
                            break;
                        }
                    }
                }
            };

            let sample = match event {
                SampleEvent::Sample(s) => s,
                SampleEvent::Eof => {
                    info!(
                        samples = stats.samples_processed,
                        "[MonitorLoop] Source reached end"
                    );
                    break;
                }
            };

            stats.samples_processed += 1;

            if sample.is_empty() {
                stats.empty_samples += 1;
                consecutive_failures += 1;
                warn!(
                    "Failed to read sensors ({}/{})",
                    consecutive_failures, self.max_consecutive_failures
                );

                if consecutive_failures >= self.max_consecutive_failures {
                    let alert = Alert::sensor_failure(consecutive_failures);
                    self.dispatcher.dispatch(&alert).await;
                    stats.sensor_failure_alerts += 1;
                    consecutive_failures = 0;
                }

                let mut state = self.app_state.write().await;
                state.samples_processed = stats.samples_processed;
                state.consecutive_failures = consecutive_failures;
                state.status = SystemStatus::SensorError;
                continue;
            }

            consecutive_failures = 0;
            let (classification, events) = self.process_sample(&sample, &mut stats).await;

            {
                let mut state = self.app_state.write().await;
                state.samples_processed = stats.samples_processed;
                state.consecutive_failures = 0;
                state.last_sample_time = Some(sample.timestamp);
                state.history_statistics = self.analyzer.statistics();
                state.latest_classification = Some(classification);
                state.latest_sample = Some(sample);
                state.status = if events.is_empty() {
                    SystemStatus::Monitoring
                } else {
                    SystemStatus::Alert
                };
                for event in events {
                    state.push_event(event);
                }
                state.alerts_sent = stats.alerts_sent;
            }

            if stats.samples_processed % PROGRESS_LOG_EVERY == 0 {
                info!(
                    samples = stats.samples_processed,
                    events = stats.events_detected,
                    alerts = stats.alerts_sent,
                    "Progress"
                );
            }
        }

        self.app_state.write().await.status = SystemStatus::Stopped;

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.flush() {
                warn!(error = %e, "Failed to flush storage on shutdown");
            }
        }

        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("📊 FINAL STATISTICS");
        info!("   Samples Processed:  {}", stats.samples_processed);
        info!("   Empty Samples:      {}", stats.empty_samples);
        info!("   Events Detected:    {}", stats.events_detected);
        info!("   Alerts Sent:        {}", stats.alerts_sent);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        stats
    }

    /// Classify, persist, analyze and alert for one non-empty sample.
    async fn process_sample(
        &mut self,
        sample: &Sample,
        stats: &mut LoopStats,
    ) -> (ClassificationResult, Vec<Event>) {
        let classification = self.classifier.classify(sample);
        debug!(
            reading = %sample,
            quality = %classification.band,
            score = classification.score,
            "Sample classified"
        );

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.save_reading(sample, &classification) {
                error!(error = %e, "Failed to save reading");
                stats.storage_errors += 1;
            }
        }

        let now = match self.clock {
            AnalysisClock::WallClock => chrono::Utc::now(),
            AnalysisClock::SampleTime => sample.timestamp,
        };
        let events = self.analyzer.analyze_at(sample, now);

        for event in &events {
            warn!(
                event_type = %event.event_type,
                severity = %event.severity,
                "Pollution Event: {}",
                event.description
            );
            stats.events_detected += 1;

            let alert = Alert::from_event(event, sample);
            let delivered = self
                .dispatcher
                .dispatch(&alert)
                .await
                .iter()
                .filter(|r| r.success)
                .count();
            stats.alerts_sent += delivered as u64;

            if let Some(storage) = &self.storage {
                if let Err(e) = storage.save_event(event) {
                    error!(error = %e, "Failed to save event");
                    stats.storage_errors += 1;
                }
            }
        }

        (classification, events)
    }
}
