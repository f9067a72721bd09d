//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Analyzer
// ============================================================================

/// Per-parameter history window size (samples).
///
/// 60 samples at a 10 s interval = 10 minutes of recent context.
pub const HISTORY_CAPACITY: usize = 60;

/// Upper bound on `analyzer.history_capacity` (one day of 1 s samples).
pub const MAX_HISTORY_CAPACITY: usize = 86_400;

/// Quiet interval before the same (event type, severity) may fire again (seconds).
pub const EVENT_COOLDOWN_SECS: u64 = 300;

/// Upper bound on `analyzer.cooldown_secs` (one year).
pub const MAX_COOLDOWN_SECS: u64 = 31_536_000;

/// Longest history any rule needs before it activates (trend rules).
pub const LONGEST_RULE_HORIZON: usize = 30;

// ============================================================================
// Pipeline
// ============================================================================

/// Recent events kept in the status snapshot for the API.
pub const RECENT_EVENTS_KEPT: usize = 50;

/// Progress log line every N samples.
pub const PROGRESS_LOG_EVERY: u64 = 30;

// ============================================================================
// Storage
// ============================================================================

/// Default sled database directory.
pub const DEFAULT_DB_PATH: &str = "./data/aquasentinel.db";

/// Row cap for exports.
pub const EXPORT_ROW_LIMIT: usize = 100_000;

// ============================================================================
// Reports
// ============================================================================

/// Events listed in a generated report.
pub const REPORT_EVENTS_SHOWN: usize = 10;

// ============================================================================
// Simulation
// ============================================================================

/// Base delay denominator for `--speed` flag.
///
/// `delay_ms = SIMULATION_BASE_DELAY_MS / speed`
pub const SIMULATION_BASE_DELAY_MS: u64 = 10_000;
