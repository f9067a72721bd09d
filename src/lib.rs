//! AquaSentinel: Water Quality Pollution Event Detection
//!
//! Classifies multi-parameter water samples (pH, turbidity, temperature)
//! into quality bands and detects pollution events from rolling history.
//!
//! ## Architecture
//!
//! - **Analyzer**: rolling windows, rule table and per-key cooldown
//! - **Classifier**: stateless band lookup and weighted 0-100 score
//! - **Pipeline**: sample sources and the single-owner monitor loop
//! - **Storage / Alerts / API**: persistence, notification and status surfaces

pub mod alerts;
pub mod analyzer;
pub mod api;
pub mod classifier;
pub mod config;
pub mod pipeline;
pub mod report;
pub mod sensors;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::MonitorConfig;

// Re-export commonly used types
pub use types::{Band, ClassificationResult, Event, EventType, Parameter, Sample, Severity};

// Re-export the detection core
pub use analyzer::{AnalysisError, Analyzer};
pub use classifier::{ClassifyError, Classifier};

// Re-export storage
pub use storage::{MonitorStorage, StorageError};
