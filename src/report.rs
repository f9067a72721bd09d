//! Plain-text water quality report over the stored history

use chrono::{DateTime, Duration, Utc};

use crate::config::defaults::REPORT_EVENTS_SHOWN;
use crate::storage::{MonitorStorage, StorageError, TimeRange};
use crate::types::Parameter;

const RULE_WIDTH: usize = 60;

/// Build the report covering the `days` days before `now`.
pub fn generate_report(
    storage: &MonitorStorage,
    days: u32,
    now: DateTime<Utc>,
) -> Result<String, StorageError> {
    let since = now - Duration::days(i64::from(days));
    let range = TimeRange::between(Some(since), Some(now));

    let stats = storage.statistics(range)?;
    let distribution = storage.quality_distribution(Some(since))?;
    let events = storage.get_events(range, None, usize::MAX)?;

    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let mut lines: Vec<String> = Vec::new();

    lines.push(heavy.clone());
    lines.push("AquaSentinel Water Quality Report".to_string());
    lines.push(heavy.clone());
    lines.push(String::new());
    lines.push(format!("Report Period: {days} days"));
    lines.push(format!("Generated: {}", now.format("%Y-%m-%d %H:%M:%S")));
    lines.push(String::new());

    lines.push(light.clone());
    lines.push("STATISTICS".to_string());
    lines.push(light.clone());
    lines.push(format!("Total Readings: {}", stats.count));
    for parameter in Parameter::ALL {
        let avg = stats.get(parameter).map_or(0.0, |s| s.avg);
        let label = match parameter {
            Parameter::Ph => "pH",
            Parameter::Turbidity => "Turbidity",
            Parameter::Temperature => "Temperature",
        };
        lines.push(format!("Average {label}: {avg:.2}{}", parameter.unit()));
    }
    lines.push(String::new());

    lines.push(light.clone());
    lines.push("WATER QUALITY DISTRIBUTION".to_string());
    lines.push(light.clone());
    let denominator = stats.count.max(1) as f64;
    for (band, count) in &distribution {
        let pct = *count as f64 * 100.0 / denominator;
        lines.push(format!("{band}: {count} ({pct:.1}%)"));
    }
    lines.push(String::new());

    lines.push(light.clone());
    lines.push("POLLUTION EVENTS".to_string());
    lines.push(light);
    lines.push(format!("Total Events: {}", events.len()));
    lines.push(String::new());
    for event in events.iter().take(REPORT_EVENTS_SHOWN) {
        lines.push(format!(
            "[{}] {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.event_type.as_str().to_uppercase()
        ));
        lines.push(format!("  Severity: {}", event.severity));
        lines.push(format!("  Description: {}", event.description));
        lines.push(String::new());
    }

    lines.push(heavy);
    lines.push(String::new());

    tracing::debug!(
        days,
        readings = stats.count,
        events = events.len(),
        "Report generated"
    );
    Ok(lines.join("\n"))
}
