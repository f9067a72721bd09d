//! Storage Integration Tests
//!
//! Classified samples and analyzer events written through the public API,
//! then read back across a database reopen.

use aquasentinel::classifier::Classifier;
use aquasentinel::config::ThresholdConfig;
use aquasentinel::report::generate_report;
use aquasentinel::sensors::generate_simulated_data;
use aquasentinel::storage::TimeRange;
use aquasentinel::{Analyzer, Band, EventType, MonitorStorage, Sample, Severity};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 20, 6, 0, 0).unwrap()
}

/// Classify, analyze and store `samples` the way the monitor loop does.
fn ingest(storage: &MonitorStorage, samples: &[Sample]) -> usize {
    let classifier = Classifier::new(ThresholdConfig::default());
    let mut analyzer = Analyzer::default();
    let mut events = 0;
    for sample in samples {
        let result = classifier.classify(sample);
        storage.save_reading(sample, &result).unwrap();
        for event in analyzer.analyze_at(sample, sample.timestamp) {
            storage.save_event(&event).unwrap();
            events += 1;
        }
    }
    events
}

fn surge_sequence() -> Vec<Sample> {
    (0..20)
        .map(|i| {
            let turbidity = if i == 12 { 40.0 } else { 3.0 };
            Sample::at(
                Some(7.2),
                Some(turbidity),
                Some(20.0),
                start() + Duration::seconds(i * 10),
            )
        })
        .collect()
}

#[test]
fn pipeline_output_is_queryable() {
    let dir = tempfile::tempdir().unwrap();
    let storage = MonitorStorage::open(dir.path().join("monitor.db")).unwrap();

    let events = ingest(&storage, &surge_sequence());
    assert_eq!(events, 2);
    assert_eq!(storage.reading_count(), 20);
    assert_eq!(storage.event_count(), 2);

    let latest = storage.latest_reading().unwrap().unwrap();
    assert_eq!(latest.sample.timestamp, start() + Duration::seconds(190));

    let stored = storage.get_events(TimeRange::all(), None, 10).unwrap();
    let types: Vec<EventType> = stored.iter().map(|e| e.event_type).collect();
    assert!(types.contains(&EventType::TurbidityHigh));
    assert!(types.contains(&EventType::TurbiditySpike));

    let critical = storage
        .get_events(TimeRange::all(), Some(Severity::Critical), 10)
        .unwrap();
    assert!(critical.is_empty());

    let distribution = storage.quality_distribution(None).unwrap();
    assert_eq!(distribution, vec![(Band::Excellent, 19), (Band::Poor, 1)]);
}

#[test]
fn range_queries_use_sample_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let storage = MonitorStorage::open(dir.path().join("monitor.db")).unwrap();
    ingest(&storage, &surge_sequence());

    let window = TimeRange::between(
        Some(start() + Duration::seconds(100)),
        Some(start() + Duration::seconds(150)),
    );
    let readings = storage.get_readings(window, 100).unwrap();
    assert_eq!(readings.len(), 6);
    assert_eq!(readings[0].sample.timestamp, start() + Duration::seconds(150));

    let stats = storage.statistics(window).unwrap();
    assert_eq!(stats.count, 6);
    let turbidity = stats.turbidity.unwrap();
    assert_eq!(turbidity.max, 40.0);
    assert_eq!(turbidity.min, 3.0);
}

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitor.db");
    {
        let storage = MonitorStorage::open(&path).unwrap();
        ingest(&storage, &surge_sequence());
        storage.flush().unwrap();
    }

    let storage = MonitorStorage::open(&path).unwrap();
    assert_eq!(storage.reading_count(), 20);
    assert_eq!(storage.event_count(), 2);
}

#[test]
fn retention_cleanup_keeps_recent_rows() {
    let dir = tempfile::tempdir().unwrap();
    let storage = MonitorStorage::open(dir.path().join("monitor.db")).unwrap();
    ingest(&storage, &surge_sequence());

    let removed = storage
        .cleanup_before(start() + Duration::seconds(100))
        .unwrap();
    // ten readings before the cutoff, events are at t=120
    assert_eq!(removed, 10);
    assert_eq!(storage.reading_count(), 10);
    assert_eq!(storage.event_count(), 2);
}

#[test]
fn csv_export_of_simulated_run() {
    let dir = tempfile::tempdir().unwrap();
    let storage = MonitorStorage::open(dir.path().join("monitor.db")).unwrap();
    let samples = generate_simulated_data(50, 7, start(), Duration::seconds(10));
    ingest(&storage, &samples);

    let mut out = Vec::new();
    let rows = storage.export_csv(TimeRange::all(), 1000, &mut out).unwrap();
    assert_eq!(rows, 50);

    let text = String::from_utf8(out).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("Timestamp,pH,Turbidity (NTU),Temperature (°C),Quality Class,Quality Score")
    );
    assert_eq!(lines.count(), 50);
}

#[test]
fn report_covers_stored_history() {
    let dir = tempfile::tempdir().unwrap();
    let storage = MonitorStorage::open(dir.path().join("monitor.db")).unwrap();
    ingest(&storage, &surge_sequence());

    let report = generate_report(&storage, 7, start() + Duration::hours(1)).unwrap();
    assert!(report.contains("Total Readings: 20"));
    assert!(report.contains("Total Events: 2"));
    assert!(report.contains("TURBIDITY_SPIKE"));
}
