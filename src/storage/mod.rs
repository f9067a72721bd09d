//! Reading and Event Storage
//!
//! Persists classified samples and detected events to Sled DB.
//!
//! Two trees share one key layout: timestamp nanoseconds (u64 big-endian)
//! followed by a database-generated sequence number, so iteration is
//! chronological and samples sharing a timestamp never overwrite each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::types::{Band, ClassificationResult, Event, Parameter, Sample, Severity};

const READINGS_TREE: &str = "readings";
const EVENTS_TREE: &str = "events";

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Records
// ============================================================================

/// A sample stored together with its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    #[serde(flatten)]
    pub sample: Sample,
    pub quality_class: Band,
    pub quality_score: u8,
}

/// Inclusive time window for queries. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    fn key_bounds(&self) -> ([u8; 16], [u8; 16]) {
        let lo = self.start.map_or(0, ts_nanos);
        let hi = self.end.map_or(u64::MAX, ts_nanos);
        (make_key(lo, 0), make_key(hi, u64::MAX))
    }
}

/// Aggregate over one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Aggregates over stored readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadingStatistics {
    pub count: usize,
    #[serde(rename = "pH")]
    pub ph: Option<ParameterStats>,
    pub turbidity: Option<ParameterStats>,
    pub temperature: Option<ParameterStats>,
}

impl ReadingStatistics {
    pub fn get(&self, parameter: Parameter) -> Option<ParameterStats> {
        match parameter {
            Parameter::Ph => self.ph,
            Parameter::Turbidity => self.turbidity,
            Parameter::Temperature => self.temperature,
        }
    }
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    min: f64,
    max: f64,
    count: usize,
}

impl Accumulator {
    fn push(&mut self, v: f64) {
        if self.count == 0 {
            self.min = v;
            self.max = v;
        } else {
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
        self.sum += v;
        self.count += 1;
    }

    fn finish(&self) -> Option<ParameterStats> {
        (self.count > 0).then(|| ParameterStats {
            avg: self.sum / self.count as f64,
            min: self.min,
            max: self.max,
            count: self.count,
        })
    }
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Clone)]
pub struct MonitorStorage {
    db: sled::Db,
    readings: sled::Tree,
    events: sled::Tree,
}

impl MonitorStorage {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = sled::open(path)?;
        let readings = db.open_tree(READINGS_TREE)?;
        let events = db.open_tree(EVENTS_TREE)?;
        info!(path = %path.display(), readings = readings.len(), events = events.len(), "Storage opened");
        Ok(Self {
            db,
            readings,
            events,
        })
    }

    /// Store a classified sample.
    ///
    /// Does not flush per write; sled flushes in the background.
    pub fn save_reading(
        &self,
        sample: &Sample,
        classification: &ClassificationResult,
    ) -> Result<(), StorageError> {
        let record = StoredReading {
            sample: sample.clone(),
            quality_class: classification.band,
            quality_score: classification.score,
        };
        let key = make_key(ts_nanos(sample.timestamp), self.db.generate_id()?);
        self.readings.insert(key, serde_json::to_vec(&record)?)?;
        Ok(())
    }

    pub fn save_event(&self, event: &Event) -> Result<(), StorageError> {
        let key = make_key(ts_nanos(event.timestamp), self.db.generate_id()?);
        self.events.insert(key, serde_json::to_vec(event)?)?;
        debug!(event_type = %event.event_type, "Event stored");
        Ok(())
    }

    /// Readings in `range`, newest first, at most `limit`.
    pub fn get_readings(
        &self,
        range: TimeRange,
        limit: usize,
    ) -> Result<Vec<StoredReading>, StorageError> {
        let (lo, hi) = range.key_bounds();
        let mut out = Vec::with_capacity(limit.min(1024));
        for item in self.readings.range(lo..=hi).rev() {
            if out.len() >= limit {
                break;
            }
            let (_key, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }

    /// Most recent reading, if any.
    pub fn latest_reading(&self) -> Result<Option<StoredReading>, StorageError> {
        match self.readings.last()? {
            Some((_key, value)) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Events in `range`, optionally of one severity, newest first.
    pub fn get_events(
        &self,
        range: TimeRange,
        severity: Option<Severity>,
        limit: usize,
    ) -> Result<Vec<Event>, StorageError> {
        let (lo, hi) = range.key_bounds();
        let mut out = Vec::with_capacity(limit.min(1024));
        for item in self.events.range(lo..=hi).rev() {
            if out.len() >= limit {
                break;
            }
            let (_key, value) = item?;
            let event: Event = serde_json::from_slice(&value)?;
            if severity.map_or(true, |s| event.severity == s) {
                out.push(event);
            }
        }
        Ok(out)
    }

    /// Count, average, min and max per parameter over `range`.
    pub fn statistics(&self, range: TimeRange) -> Result<ReadingStatistics, StorageError> {
        let (lo, hi) = range.key_bounds();
        let mut acc: [Accumulator; 3] = Default::default();
        let mut count = 0;
        for item in self.readings.range(lo..=hi) {
            let (_key, value) = item?;
            let reading: StoredReading = serde_json::from_slice(&value)?;
            count += 1;
            for (i, parameter) in Parameter::ALL.into_iter().enumerate() {
                if let Some(v) = reading.sample.get(parameter) {
                    acc[i].push(v);
                }
            }
        }
        Ok(ReadingStatistics {
            count,
            ph: acc[0].finish(),
            turbidity: acc[1].finish(),
            temperature: acc[2].finish(),
        })
    }

    /// Reading count per quality class since `since`, in best-to-worst order.
    /// Classes with no readings are omitted.
    pub fn quality_distribution(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<(Band, usize)>, StorageError> {
        let (lo, hi) = TimeRange::between(since, None).key_bounds();
        let mut counts = [0usize; 6];
        for item in self.readings.range(lo..=hi) {
            let (_key, value) = item?;
            let reading: StoredReading = serde_json::from_slice(&value)?;
            counts[band_slot(reading.quality_class)] += 1;
        }
        Ok(DISTRIBUTION_ORDER
            .iter()
            .map(|&b| (b, counts[band_slot(b)]))
            .filter(|(_, n)| *n > 0)
            .collect())
    }

    /// Delete readings and events older than `cutoff`. Returns rows removed.
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let cutoff_key = make_key(ts_nanos(cutoff), 0);
        let mut deleted = 0;
        for tree in [&self.readings, &self.events] {
            let keys: Vec<sled::IVec> = tree
                .range(..cutoff_key)
                .keys()
                .collect::<Result<_, _>>()?;
            for key in keys {
                tree.remove(key)?;
                deleted += 1;
            }
        }
        if deleted > 0 {
            self.db.flush()?;
        }
        info!(deleted, cutoff = %cutoff, "Cleaned up old records");
        Ok(deleted)
    }

    /// Write readings in `range` as CSV, newest first. Returns rows written.
    pub fn export_csv<W: Write>(
        &self,
        range: TimeRange,
        limit: usize,
        mut writer: W,
    ) -> Result<usize, StorageError> {
        let readings = self.get_readings(range, limit)?;
        writeln!(
            writer,
            "Timestamp,pH,Turbidity (NTU),Temperature (°C),Quality Class,Quality Score"
        )?;
        for r in &readings {
            writeln!(
                writer,
                "{},{},{},{},{},{}",
                r.sample.timestamp.to_rfc3339(),
                csv_field(r.sample.ph),
                csv_field(r.sample.turbidity),
                csv_field(r.sample.temperature),
                r.quality_class,
                r.quality_score
            )?;
        }
        writer.flush()?;
        info!(rows = readings.len(), "Exported readings as CSV");
        Ok(readings.len())
    }

    /// Write readings in `range` as a pretty-printed JSON array.
    pub fn export_json<W: Write>(
        &self,
        range: TimeRange,
        limit: usize,
        mut writer: W,
    ) -> Result<usize, StorageError> {
        let readings = self.get_readings(range, limit)?;
        serde_json::to_writer_pretty(&mut writer, &readings)?;
        writer.flush()?;
        info!(rows = readings.len(), "Exported readings as JSON");
        Ok(readings.len())
    }

    pub fn reading_count(&self) -> usize {
        self.readings.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

const DISTRIBUTION_ORDER: [Band; 6] = [
    Band::Excellent,
    Band::Good,
    Band::Fair,
    Band::Poor,
    Band::Critical,
    Band::Unknown,
];

fn band_slot(band: Band) -> usize {
    match band {
        Band::Excellent => 0,
        Band::Good => 1,
        Band::Fair => 2,
        Band::Poor => 3,
        Band::Critical => 4,
        Band::Unknown => 5,
    }
}

fn csv_field(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Nanoseconds since the epoch; pre-epoch and out-of-range times clamp.
fn ts_nanos(ts: DateTime<Utc>) -> u64 {
    match ts.timestamp_nanos_opt() {
        Some(n) => u64::try_from(n).unwrap_or(0),
        None if ts.timestamp() > 0 => u64::MAX,
        None => 0,
    }
}

fn make_key(nanos: u64, seq: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&nanos.to_be_bytes());
    key[8..].copy_from_slice(&seq.to_be_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn classification(band: Band, score: u8) -> ClassificationResult {
        ClassificationResult {
            band,
            score,
            details: None,
        }
    }

    fn open_temp() -> (tempfile::TempDir, MonitorStorage) {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = MonitorStorage::open(temp_dir.path().join("test.db")).unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_storage_open() {
        let (_dir, storage) = open_temp();
        assert_eq!(storage.reading_count(), 0);
        assert_eq!(storage.event_count(), 0);
    }

    #[test]
    fn test_chronological_order() {
        let (_dir, storage) = open_temp();
        for secs in [30, 10, 20] {
            let s = Sample::at(Some(7.0), None, None, t(secs));
            storage.save_reading(&s, &classification(Band::Excellent, 100)).unwrap();
        }
        let readings = storage.get_readings(TimeRange::all(), 10).unwrap();
        let times: Vec<_> = readings.iter().map(|r| r.sample.timestamp).collect();
        assert_eq!(times, vec![t(30), t(20), t(10)]);
    }

    #[test]
    fn test_same_timestamp_kept() {
        let (_dir, storage) = open_temp();
        let s = Sample::at(Some(7.0), None, None, t(0));
        storage.save_reading(&s, &classification(Band::Good, 80)).unwrap();
        storage.save_reading(&s, &classification(Band::Good, 80)).unwrap();
        assert_eq!(storage.reading_count(), 2);
    }

    #[test]
    fn test_range_and_limit() {
        let (_dir, storage) = open_temp();
        for i in 0..10 {
            let s = Sample::at(Some(7.0), Some(i as f64), None, t(i * 100));
            storage.save_reading(&s, &classification(Band::Good, 80)).unwrap();
        }
        let range = TimeRange::between(Some(t(200)), Some(t(600)));
        assert_eq!(storage.get_readings(range, 100).unwrap().len(), 5);
        let limited = storage.get_readings(TimeRange::all(), 3).unwrap();
        assert_eq!(limited.len(), 3);
        assert_eq!(limited[0].sample.turbidity, Some(9.0));
    }

    #[test]
    fn test_events_filtered_by_severity() {
        let (_dir, storage) = open_temp();
        let mk = |severity, secs| Event {
            event_type: crate::types::EventType::PhLow,
            severity,
            description: "x".to_string(),
            ph: Some(5.2),
            turbidity: None,
            temperature: None,
            timestamp: t(secs),
        };
        storage.save_event(&mk(Severity::Warning, 1)).unwrap();
        storage.save_event(&mk(Severity::Critical, 2)).unwrap();
        storage.save_event(&mk(Severity::Warning, 3)).unwrap();

        let warnings = storage
            .get_events(TimeRange::all(), Some(Severity::Warning), 10)
            .unwrap();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].timestamp, t(3));
        assert_eq!(storage.get_events(TimeRange::all(), None, 10).unwrap().len(), 3);
    }

    #[test]
    fn test_statistics_skip_absent_values() {
        let (_dir, storage) = open_temp();
        let c = classification(Band::Good, 80);
        storage.save_reading(&Sample::at(Some(7.0), Some(2.0), None, t(0)), &c).unwrap();
        storage.save_reading(&Sample::at(Some(8.0), None, None, t(1)), &c).unwrap();
        let stats = storage.statistics(TimeRange::all()).unwrap();
        assert_eq!(stats.count, 2);
        let ph = stats.ph.unwrap();
        assert_eq!(ph.avg, 7.5);
        assert_eq!(ph.min, 7.0);
        assert_eq!(ph.max, 8.0);
        assert_eq!(stats.turbidity.unwrap().count, 1);
        assert!(stats.temperature.is_none());
    }

    #[test]
    fn test_quality_distribution() {
        let (_dir, storage) = open_temp();
        let s = |secs| Sample::at(Some(7.0), None, None, t(secs));
        storage.save_reading(&s(0), &classification(Band::Poor, 40)).unwrap();
        storage.save_reading(&s(1), &classification(Band::Excellent, 100)).unwrap();
        storage.save_reading(&s(2), &classification(Band::Excellent, 100)).unwrap();
        let dist = storage.quality_distribution(None).unwrap();
        assert_eq!(dist, vec![(Band::Excellent, 2), (Band::Poor, 1)]);
        let recent = storage.quality_distribution(Some(t(1))).unwrap();
        assert_eq!(recent, vec![(Band::Excellent, 2)]);
    }

    #[test]
    fn test_cleanup_removes_both_trees() {
        let (_dir, storage) = open_temp();
        let c = classification(Band::Good, 80);
        for secs in [100, 200, 300] {
            storage.save_reading(&Sample::at(Some(7.0), None, None, t(secs)), &c).unwrap();
        }
        let event = Event {
            event_type: crate::types::EventType::TurbidityHigh,
            severity: Severity::Warning,
            description: "High turbidity detected: 30.0 NTU".to_string(),
            ph: None,
            turbidity: Some(30.0),
            temperature: None,
            timestamp: t(150),
        };
        storage.save_event(&event).unwrap();

        let deleted = storage.cleanup_before(t(250)).unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(storage.reading_count(), 1);
        assert_eq!(storage.event_count(), 0);
    }

    #[test]
    fn test_export_csv_marks_absent_as_empty() {
        let (_dir, storage) = open_temp();
        storage
            .save_reading(
                &Sample::at(Some(7.25), None, Some(20.0), t(0)),
                &classification(Band::Excellent, 60),
            )
            .unwrap();
        let mut buf = Vec::new();
        let rows = storage.export_csv(TimeRange::all(), 100, &mut buf).unwrap();
        assert_eq!(rows, 1);
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("Timestamp,pH"));
        let row = lines.next().unwrap();
        assert!(row.ends_with(",7.25,,20,excellent,60"), "row was {row}");
    }

    #[test]
    fn test_export_json_is_array() {
        let (_dir, storage) = open_temp();
        storage
            .save_reading(&Sample::at(Some(7.0), Some(3.0), Some(20.0), t(0)), &classification(Band::Excellent, 100))
            .unwrap();
        let mut buf = Vec::new();
        storage.export_json(TimeRange::all(), 100, &mut buf).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(v[0]["pH"], 7.0);
        assert_eq!(v[0]["quality_class"], "excellent");
    }
}
