//! Sensor data ingestion from CSV files and synthetic reading generation

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::types::Sample;

/// Read water samples from a CSV file
///
/// Expected CSV format:
/// timestamp,pH,turbidity,temperature
///
/// An empty field is an absent reading. Lines that cannot be parsed are
/// logged and skipped.
pub fn read_csv_data(path: &str) -> Vec<Sample> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Failed to open CSV file");
            return Vec::new();
        }
    };

    let reader = BufReader::new(file);
    let mut samples = Vec::new();
    let mut line_num = 0;

    for line_result in reader.lines() {
        line_num += 1;

        let line = match line_result {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(line = line_num, error = %e, "Error reading CSV line");
                continue;
            }
        };

        if line_num == 1 && line.starts_with("timestamp") {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        match parse_csv_line(&line, line_num) {
            Ok(sample) => samples.push(sample),
            Err(e) => {
                tracing::warn!(line = line_num, error = %e, "Error parsing CSV line");
            }
        }
    }

    tracing::info!(count = samples.len(), path = %path, "Loaded water samples from CSV");
    samples
}

fn parse_csv_line(line: &str, line_num: usize) -> Result<Sample, String> {
    let fields: Vec<&str> = line.split(',').collect();

    if fields.len() < 4 {
        return Err(format!(
            "Expected 4 fields, got {} on line {}",
            fields.len(),
            line_num
        ));
    }

    let timestamp = parse_timestamp(fields[0])?;
    let ph = parse_optional_f64(fields[1], "pH")?;
    let turbidity = parse_optional_f64(fields[2], "turbidity")?;
    let temperature = parse_optional_f64(fields[3], "temperature")?;

    Ok(Sample::at(ph, turbidity, temperature, timestamp))
}

/// Parse an RFC 3339 timestamp or Unix epoch seconds
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();

    if let Ok(epoch) = s.parse::<i64>() {
        return DateTime::from_timestamp(epoch, 0)
            .ok_or_else(|| format!("Epoch timestamp out of range: '{}'", s));
    }

    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            format!("{}Z", s.trim_end_matches('Z'))
                .parse::<DateTime<Utc>>()
                .map_err(|e| format!("Cannot parse timestamp '{}': {}", s, e))
        })
}

/// Empty field means the reading is absent
fn parse_optional_f64(s: &str, field: &str) -> Result<Option<f64>, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    s.parse::<f64>()
        .map(Some)
        .map_err(|_| format!("Cannot parse {} as f64: '{}'", field, s))
}

// ============================================================================
// Simulated Sensors
// ============================================================================

/// Kind of pollution episode injected by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Episode {
    /// pH drops steadily toward acidic
    AcidDischarge,
    /// Sediment surge: turbidity climbs fast
    SedimentSurge,
    /// Warm effluent raises the temperature
    ThermalDischarge,
}

#[derive(Debug, Clone, Copy)]
struct ActiveEpisode {
    kind: Episode,
    step: u32,
    length: u32,
}

/// Synthetic three-parameter sensor with baseline noise, occasional pollution
/// episodes and occasional read failures.
pub struct SimulatedSensors {
    rng: StdRng,
    /// Standard deviations of the baseline noise
    ph_noise: f64,
    turbidity_noise: f64,
    temperature_noise: f64,
    episode: Option<ActiveEpisode>,
    episode_chance: f64,
    dropout_chance: f64,
    samples_generated: u64,
}

impl SimulatedSensors {
    const BASE_PH: f64 = 7.2;
    const BASE_TURBIDITY: f64 = 8.5;
    const BASE_TEMPERATURE: f64 = 22.5;

    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            ph_noise: 0.1,
            turbidity_noise: 1.0,
            temperature_noise: 0.4,
            episode: None,
            episode_chance: 0.02,
            dropout_chance: 0.005,
            samples_generated: 0,
        }
    }

    /// Per-sample probability of starting a pollution episode.
    pub fn with_episode_chance(mut self, chance: f64) -> Self {
        self.episode_chance = chance.clamp(0.0, 1.0);
        self
    }

    /// Per-sample probability that every read fails.
    pub fn with_dropout_chance(mut self, chance: f64) -> Self {
        self.dropout_chance = chance.clamp(0.0, 1.0);
        self
    }

    /// Force an episode to start on the next reading.
    pub fn start_episode(&mut self, kind: Episode, length: u32) {
        self.episode = Some(ActiveEpisode {
            kind,
            step: 0,
            length: length.max(1),
        });
    }

    pub fn in_episode(&self) -> bool {
        self.episode.is_some()
    }

    pub fn samples_generated(&self) -> u64 {
        self.samples_generated
    }

    /// Produce the next reading stamped with `timestamp`.
    pub fn read(&mut self, timestamp: DateTime<Utc>) -> Sample {
        self.samples_generated += 1;

        if self.rng.gen::<f64>() < self.dropout_chance {
            tracing::debug!("Simulated sensor dropout");
            return Sample::at(None, None, None, timestamp);
        }

        if self.episode.is_none() && self.rng.gen::<f64>() < self.episode_chance {
            let kind = match self.rng.gen_range(0..3) {
                0 => Episode::AcidDischarge,
                1 => Episode::SedimentSurge,
                _ => Episode::ThermalDischarge,
            };
            let length = self.rng.gen_range(10..=25);
            tracing::debug!(?kind, length, "Simulated pollution episode started");
            self.start_episode(kind, length);
        }

        let mut ph = Self::BASE_PH + self.noise(self.ph_noise);
        let mut turbidity = Self::BASE_TURBIDITY + self.noise(self.turbidity_noise);
        let mut temperature = Self::BASE_TEMPERATURE + self.noise(self.temperature_noise);

        if let Some(mut episode) = self.episode.take() {
            episode.step += 1;
            // ramps up over the first half, holds, then the episode ends
            let ramp = (f64::from(episode.step) / (f64::from(episode.length) / 2.0)).min(1.0);
            match episode.kind {
                Episode::AcidDischarge => ph -= 2.5 * ramp,
                Episode::SedimentSurge => turbidity += 60.0 * ramp,
                Episode::ThermalDischarge => temperature += 12.0 * ramp,
            }
            if episode.step < episode.length {
                self.episode = Some(episode);
            }
        }

        Sample::at(
            Some(round_to(ph.clamp(0.0, 14.0), 2)),
            Some(round_to(turbidity.max(0.0), 1)),
            Some(round_to(temperature, 1)),
            timestamp,
        )
    }

    fn noise(&mut self, std_dev: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        z * std_dev
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Generate `count` synthetic samples spaced `interval` apart from `start`.
pub fn generate_simulated_data(
    count: usize,
    seed: u64,
    start: DateTime<Utc>,
    interval: Duration,
) -> Vec<Sample> {
    let mut sensors = SimulatedSensors::new(Some(seed));
    let samples: Vec<Sample> = (0..count)
        .map(|i| {
            let offset = interval * i32::try_from(i).unwrap_or(i32::MAX);
            sensors.read(start + offset)
        })
        .collect();
    tracing::debug!(count = samples.len(), seed, "Generated simulated water samples");
    samples
}
