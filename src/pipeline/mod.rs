//! Monitoring Pipeline
//!
//! ```text
//! SampleSource ──► MonitorLoop ──► classify ──► store reading
//!                                  analyze  ──► alert + store event
//!                                     │
//!                                     ▼
//!                          Arc<RwLock<AppState>> ──► status API
//! ```
//!
//! The loop is the only writer of the state snapshot and the only owner of
//! the analyzer's mutable windows.

mod state;
pub mod processing_loop;
pub mod source;

pub use processing_loop::{AnalysisClock, LoopStats, MonitorLoop};
pub use source::{CsvSource, SampleEvent, SampleSource, SimulatedSource, StdinSource};
pub use state::*;
