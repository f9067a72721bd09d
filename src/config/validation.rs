//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physical range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for MonitorConfig.
///
/// Maintained by hand to match the struct hierarchy in monitor_config.rs.
/// Webhook entries are arrays of tables, so their inner keys are not walked.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [station]
        "station",
        "station.name",
        "station.location",
        // [system]
        "system",
        "system.measurement_interval_secs",
        "system.max_consecutive_failures",
        // [thresholds]
        "thresholds",
        "thresholds.pH",
        "thresholds.pH.excellent",
        "thresholds.pH.good",
        "thresholds.pH.fair",
        "thresholds.turbidity",
        "thresholds.turbidity.excellent",
        "thresholds.turbidity.good",
        "thresholds.turbidity.fair",
        "thresholds.turbidity.poor",
        "thresholds.temperature",
        "thresholds.temperature.excellent",
        "thresholds.temperature.good",
        "thresholds.temperature.fair",
        // [analyzer]
        "analyzer",
        "analyzer.history_capacity",
        "analyzer.cooldown_secs",
        // [alerts]
        "alerts",
        "alerts.local_enabled",
        "alerts.webhooks",
        // [storage]
        "storage",
        "storage.path",
        "storage.retention_days",
        // [server]
        "server",
        "server.addr",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (*k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical ranges on a parsed MonitorConfig.
///
/// Returns (errors, warnings). Errors are impossible values that must
/// prevent startup; warnings are suspicious but not fatal.
pub fn validate_physical_ranges(
    config: &super::MonitorConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // pH is bounded by chemistry
    for (band, range) in config.thresholds.ph.table().named_ranges() {
        if range.low() < 0.0 || range.high() > 14.0 {
            errors.push(format!(
                "thresholds.pH.{band} = [{:.2}, {:.2}] is outside the pH scale (0-14)",
                range.low(),
                range.high()
            ));
        }
    }

    // Turbidity cannot be negative
    for (band, range) in config.thresholds.turbidity.table().named_ranges() {
        if range.low() < 0.0 {
            errors.push(format!(
                "thresholds.turbidity.{band} lower bound {:.1} NTU cannot be negative",
                range.low()
            ));
        }
    }

    // Closed-interval parameters: a narrower outer band hides part of the inner one
    for (name, table) in [
        ("pH", config.thresholds.ph.table()),
        ("temperature", config.thresholds.temperature.table()),
    ] {
        let nested = |inner: super::BandRange, outer: super::BandRange| {
            outer.low() <= inner.low() && inner.high() <= outer.high()
        };
        if !nested(table.excellent, table.good) || !nested(table.good, table.fair) {
            warnings.push(ValidationWarning {
                field: format!("thresholds.{name}"),
                message: format!(
                    "thresholds.{name} bands are not nested (excellent within good within fair)"
                ),
                suggestion: None,
            });
        }
    }

    // Turbidity bands are expected to tile upward without gaps
    let t = config.thresholds.turbidity.table();
    let ranges = t.named_ranges();
    for pair in ranges.windows(2) {
        let ((lower_name, lower), (upper_name, upper)) = (pair[0], pair[1]);
        if (lower.high() - upper.low()).abs() > f64::EPSILON {
            warnings.push(ValidationWarning {
                field: format!("thresholds.turbidity.{upper_name}"),
                message: format!(
                    "thresholds.turbidity.{upper_name} starts at {:.1} but {lower_name} ends at {:.1}; readings in between classify as critical",
                    upper.low(),
                    lower.high()
                ),
                suggestion: None,
            });
        }
    }

    if config.analyzer.cooldown_secs > 86_400 {
        warnings.push(ValidationWarning {
            field: "analyzer.cooldown_secs".to_string(),
            message: format!(
                "analyzer.cooldown_secs = {} suppresses repeats for more than a day",
                config.analyzer.cooldown_secs
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
