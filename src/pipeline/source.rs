//! Sample source abstraction for water-quality ingestion.
//!
//! Provides a unified trait for reading samples from different sources:
//! CSV files (replay), stdin (JSON lines), and a seeded simulator.

use crate::sensors::SimulatedSensors;
use crate::types::Sample;
use anyhow::Result;
use async_trait::async_trait;

/// Events produced by a sample source.
#[derive(Debug)]
pub enum SampleEvent {
    /// A sample was read. It may be empty if every sensor read failed.
    Sample(Sample),
    /// Source reached end of data.
    Eof,
}

/// Trait abstracting where samples come from.
///
/// Implementations handle format parsing and pacing internally.
/// The monitor loop calls [`next_sample`](SampleSource::next_sample) in a
/// `select!` with cancellation.
#[async_trait]
pub trait SampleSource: Send + 'static {
    /// Read the next sample from the source.
    ///
    /// Returns `SampleEvent::Eof` when no more data is available.
    async fn next_sample(&mut self) -> Result<SampleEvent>;

    /// Human-readable name for logging (e.g. "CSV", "stdin").
    fn source_name(&self) -> &str;
}

async fn pace(delay_ms: u64, yielded_first: bool) {
    if yielded_first && delay_ms > 0 {
        tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
    }
}

// ============================================================================
// CSV Source (file replay)
// ============================================================================

/// Replays pre-loaded samples with optional inter-sample delay.
pub struct CsvSource {
    samples: std::vec::IntoIter<Sample>,
    delay_ms: u64,
    yielded_first: bool,
}

impl CsvSource {
    pub fn new(samples: Vec<Sample>, delay_ms: u64) -> Self {
        Self {
            samples: samples.into_iter(),
            delay_ms,
            yielded_first: false,
        }
    }
}

#[async_trait]
impl SampleSource for CsvSource {
    async fn next_sample(&mut self) -> Result<SampleEvent> {
        // no delay before the first sample
        pace(self.delay_ms, self.yielded_first).await;
        match self.samples.next() {
            Some(s) => {
                self.yielded_first = true;
                Ok(SampleEvent::Sample(s))
            }
            None => Ok(SampleEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "CSV"
    }
}

// ============================================================================
// Stdin Source (JSON samples, one per line)
// ============================================================================

/// Reads JSON-formatted samples from stdin.
///
/// `{"pH": 7.1, "turbidity": 3.2, "temperature": 19.8}`; a missing
/// `timestamp` is stamped on arrival.
pub struct StdinSource {
    reader: tokio::io::BufReader<tokio::io::Stdin>,
    line_buffer: String,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::BufReader::new(tokio::io::stdin()),
            line_buffer: String::with_capacity(256),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SampleSource for StdinSource {
    async fn next_sample(&mut self) -> Result<SampleEvent> {
        use tokio::io::AsyncBufReadExt;
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(SampleEvent::Eof);
            }
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Sample>(line) {
                Ok(sample) => return Ok(SampleEvent::Sample(sample)),
                Err(e) => {
                    tracing::warn!(error = %e, "[StdinSource] Failed to parse sample");
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

// ============================================================================
// Simulated Source
// ============================================================================

/// Live synthetic readings stamped with the current time.
pub struct SimulatedSource {
    sensors: SimulatedSensors,
    delay_ms: u64,
    max_samples: Option<u64>,
    yielded_first: bool,
}

impl SimulatedSource {
    pub fn new(sensors: SimulatedSensors, delay_ms: u64) -> Self {
        Self {
            sensors,
            delay_ms,
            max_samples: None,
            yielded_first: false,
        }
    }

    /// Stop with `Eof` after `n` samples.
    pub fn with_max_samples(mut self, n: u64) -> Self {
        self.max_samples = Some(n);
        self
    }
}

#[async_trait]
impl SampleSource for SimulatedSource {
    async fn next_sample(&mut self) -> Result<SampleEvent> {
        if self
            .max_samples
            .is_some_and(|max| self.sensors.samples_generated() >= max)
        {
            return Ok(SampleEvent::Eof);
        }
        pace(self.delay_ms, self.yielded_first).await;
        self.yielded_first = true;
        Ok(SampleEvent::Sample(self.sensors.read(chrono::Utc::now())))
    }

    fn source_name(&self) -> &str {
        "simulator"
    }
}
