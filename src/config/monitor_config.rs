//! Monitor Configuration - classifier bands, analyzer tuning, collaborators
//!
//! Every field carries a serde default so a partial (or missing) TOML file
//! yields the documented built-in behaviour. Rule-engine thresholds are fixed
//! in `analyzer::rules` and deliberately absent from this file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::alerts::ChannelPriority;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "AQUASENTINEL_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "aquasentinel.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a monitoring station.
///
/// Load with `MonitorConfig::load()` which searches:
/// 1. `$AQUASENTINEL_CONFIG`
/// 2. `./aquasentinel.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Station identification
    #[serde(default)]
    pub station: StationInfo,

    /// Sampling loop timing
    #[serde(default)]
    pub system: SystemConfig,

    /// Classifier band boundaries
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// History window and event cooldown
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Notification channels
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Status API
    #[serde(default)]
    pub server: ServerConfig,
}

impl MonitorConfig {
    /// Load configuration using the standard search order:
    /// 1. `$AQUASENTINEL_CONFIG` environment variable
    /// 2. `./aquasentinel.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), station = %config.station.name, "Loaded config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(station = %config.station.name, "Loaded config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys only warn.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate band boundaries and tuning values for internal consistency.
    ///
    /// Rules:
    /// - Every band bound is finite and `low <= high`
    /// - History capacity covers the longest rule horizon (30 samples) and
    ///   stays under `MAX_HISTORY_CAPACITY`
    /// - Cooldown is at most `MAX_COOLDOWN_SECS`
    /// - Intervals and failure limits are non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        for (name, table) in self.thresholds.tables() {
            for (band, range) in table.named_ranges() {
                Self::check_range(range, &format!("thresholds.{name}.{band}"), &mut errors);
            }
        }

        if self.analyzer.history_capacity < super::defaults::LONGEST_RULE_HORIZON {
            errors.push(format!(
                "analyzer.history_capacity ({}) must be >= {} so trend rules can run",
                self.analyzer.history_capacity,
                super::defaults::LONGEST_RULE_HORIZON
            ));
        }
        if self.analyzer.history_capacity > super::defaults::MAX_HISTORY_CAPACITY {
            errors.push(format!(
                "analyzer.history_capacity ({}) must be <= {}",
                self.analyzer.history_capacity,
                super::defaults::MAX_HISTORY_CAPACITY
            ));
        }
        if self.analyzer.cooldown_secs > super::defaults::MAX_COOLDOWN_SECS {
            errors.push(format!(
                "analyzer.cooldown_secs ({}) must be <= {} (one year)",
                self.analyzer.cooldown_secs,
                super::defaults::MAX_COOLDOWN_SECS
            ));
        }

        if self.system.measurement_interval_secs == 0 {
            errors.push("system.measurement_interval_secs must be > 0".to_string());
        }
        if self.system.max_consecutive_failures == 0 {
            errors.push("system.max_consecutive_failures must be > 0".to_string());
        }
        if self.storage.retention_days == 0 {
            errors.push("storage.retention_days must be > 0".to_string());
        }

        for (i, hook) in self.alerts.webhooks.iter().enumerate() {
            if !hook.url.starts_with("http://") && !hook.url.starts_with("https://") {
                errors.push(format!(
                    "alerts.webhooks[{i}].url must be an http(s) URL, got '{}'",
                    hook.url
                ));
            }
        }

        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_range(range: BandRange, name: &str, errors: &mut Vec<String>) {
        // NaN/Inf comparisons silently pass, catch them explicitly
        if !range.low().is_finite() || !range.high().is_finite() {
            errors.push(format!(
                "{name}: bounds must be finite (got [{}, {}])",
                range.low(),
                range.high()
            ));
            return;
        }
        if range.low() > range.high() {
            errors.push(format!(
                "{name}: low ({:.3}) must be <= high ({:.3})",
                range.low(),
                range.high()
            ));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Station Info
// ============================================================================

/// Identification metadata, used in logs and reports only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationInfo {
    #[serde(default = "default_station_name")]
    pub name: String,

    #[serde(default)]
    pub location: String,
}

fn default_station_name() -> String {
    "AquaSentinel".to_string()
}

impl Default for StationInfo {
    fn default() -> Self {
        Self {
            name: default_station_name(),
            location: String::new(),
        }
    }
}

// ============================================================================
// System
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Seconds between samples in live mode.
    #[serde(default = "default_measurement_interval")]
    pub measurement_interval_secs: u64,

    /// Consecutive empty reads before a sensor failure alert is raised.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

fn default_measurement_interval() -> u64 { 10 }
fn default_max_consecutive_failures() -> u32 { 5 }

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            measurement_interval_secs: default_measurement_interval(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

// ============================================================================
// Classifier Thresholds
// ============================================================================

/// Inclusive-start band bounds written as `[low, high]` in TOML.
///
/// Whether `high` is inclusive depends on the parameter's interval
/// convention, not on the range itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRange(pub f64, pub f64);

impl BandRange {
    pub fn low(&self) -> f64 {
        self.0
    }

    pub fn high(&self) -> f64 {
        self.1
    }
}

/// Parameter-independent view of the configured bands, checked in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandTable {
    pub excellent: BandRange,
    pub good: BandRange,
    pub fair: BandRange,
    /// Only turbidity configures an explicit poor band.
    pub poor: Option<BandRange>,
}

impl BandTable {
    /// Configured ranges with their band names, in evaluation order.
    pub fn named_ranges(&self) -> Vec<(&'static str, BandRange)> {
        let mut out = vec![
            ("excellent", self.excellent),
            ("good", self.good),
            ("fair", self.fair),
        ];
        if let Some(poor) = self.poor {
            out.push(("poor", poor));
        }
        out
    }
}

/// Band boundaries for all three parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default, rename = "pH")]
    pub ph: PhBands,

    #[serde(default)]
    pub turbidity: TurbidityBands,

    #[serde(default)]
    pub temperature: TemperatureBands,
}

impl ThresholdConfig {
    /// Band tables keyed by their TOML section name.
    pub fn tables(&self) -> [(&'static str, BandTable); 3] {
        [
            ("pH", self.ph.table()),
            ("turbidity", self.turbidity.table()),
            ("temperature", self.temperature.table()),
        ]
    }
}

/// pH bands (closed intervals).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhBands {
    #[serde(default = "default_ph_excellent")]
    pub excellent: BandRange,
    #[serde(default = "default_ph_good")]
    pub good: BandRange,
    #[serde(default = "default_ph_fair")]
    pub fair: BandRange,
}

fn default_ph_excellent() -> BandRange { BandRange(6.5, 8.5) }
fn default_ph_good() -> BandRange { BandRange(6.0, 9.0) }
fn default_ph_fair() -> BandRange { BandRange(5.5, 9.5) }

impl Default for PhBands {
    fn default() -> Self {
        Self {
            excellent: default_ph_excellent(),
            good: default_ph_good(),
            fair: default_ph_fair(),
        }
    }
}

impl PhBands {
    pub fn table(&self) -> BandTable {
        BandTable {
            excellent: self.excellent,
            good: self.good,
            fair: self.fair,
            poor: None,
        }
    }
}

/// Turbidity bands in NTU (half-open intervals).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurbidityBands {
    #[serde(default = "default_turbidity_excellent")]
    pub excellent: BandRange,
    #[serde(default = "default_turbidity_good")]
    pub good: BandRange,
    #[serde(default = "default_turbidity_fair")]
    pub fair: BandRange,
    #[serde(default = "default_turbidity_poor")]
    pub poor: BandRange,
}

fn default_turbidity_excellent() -> BandRange { BandRange(0.0, 5.0) }
fn default_turbidity_good() -> BandRange { BandRange(5.0, 10.0) }
fn default_turbidity_fair() -> BandRange { BandRange(10.0, 25.0) }
fn default_turbidity_poor() -> BandRange { BandRange(25.0, 100.0) }

impl Default for TurbidityBands {
    fn default() -> Self {
        Self {
            excellent: default_turbidity_excellent(),
            good: default_turbidity_good(),
            fair: default_turbidity_fair(),
            poor: default_turbidity_poor(),
        }
    }
}

impl TurbidityBands {
    pub fn table(&self) -> BandTable {
        BandTable {
            excellent: self.excellent,
            good: self.good,
            fair: self.fair,
            poor: Some(self.poor),
        }
    }
}

/// Temperature bands in °C (closed intervals).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureBands {
    #[serde(default = "default_temperature_excellent")]
    pub excellent: BandRange,
    #[serde(default = "default_temperature_good")]
    pub good: BandRange,
    #[serde(default = "default_temperature_fair")]
    pub fair: BandRange,
}

fn default_temperature_excellent() -> BandRange { BandRange(15.0, 25.0) }
fn default_temperature_good() -> BandRange { BandRange(10.0, 30.0) }
fn default_temperature_fair() -> BandRange { BandRange(5.0, 35.0) }

impl Default for TemperatureBands {
    fn default() -> Self {
        Self {
            excellent: default_temperature_excellent(),
            good: default_temperature_good(),
            fair: default_temperature_fair(),
        }
    }
}

impl TemperatureBands {
    pub fn table(&self) -> BandTable {
        BandTable {
            excellent: self.excellent,
            good: self.good,
            fair: self.fair,
            poor: None,
        }
    }
}

// ============================================================================
// Analyzer
// ============================================================================

/// Rolling-window and deduplication tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Samples kept per parameter.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Quiet interval between identical (event type, severity) emissions.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

fn default_history_capacity() -> usize { super::defaults::HISTORY_CAPACITY }
fn default_cooldown_secs() -> u64 { super::defaults::EVENT_COOLDOWN_SECS }

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

// ============================================================================
// Alerts
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Log-based local indicator channel (receives every severity).
    #[serde(default = "default_local_enabled")]
    pub local_enabled: bool,

    /// Outbound JSON webhooks.
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

fn default_local_enabled() -> bool { true }

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            local_enabled: default_local_enabled(),
            webhooks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Channel name used in logs.
    #[serde(default = "default_webhook_name")]
    pub name: String,

    pub url: String,

    /// Which severities reach this channel.
    #[serde(default = "default_webhook_priority")]
    pub priority: ChannelPriority,

    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

fn default_webhook_name() -> String { "webhook".to_string() }
fn default_webhook_priority() -> ChannelPriority { ChannelPriority::Standard }
fn default_webhook_timeout() -> u64 { 10 }

// ============================================================================
// Storage / Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,

    /// Records older than this are removed by `cleanup`.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_storage_path() -> String { super::defaults::DEFAULT_DB_PATH.to_string() }
fn default_retention_days() -> u32 { 90 }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
