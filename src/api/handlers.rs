//! API route handlers
//!
//! Handlers read the [`AppState`] snapshot published by the monitor loop and,
//! for historical queries, the sled store. They never touch the analyzer.

use axum::extract::{Query, State};
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::envelope::{respond, ApiError, ResponseMeta};
use crate::analyzer::HistoryStatistics;
use crate::pipeline::AppState;
use crate::storage::{MonitorStorage, ReadingStatistics, StoredReading, TimeRange};
use crate::types::{Band, ClassificationResult, Event, Sample, Severity};

/// Hard ceiling on rows returned by list endpoints.
const MAX_LIST_LIMIT: usize = 1000;

/// Longest look-back accepted by `hours` parameters (one year).
const MAX_HOURS: i64 = 24 * 365;

const DEFAULT_HOURS: i64 = 24;

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Snapshot written by the monitor loop
    pub app_state: Arc<RwLock<AppState>>,
    /// Reading/event history; list endpoints fall back to the in-memory
    /// ring when absent
    pub storage: Option<MonitorStorage>,
}

impl ApiState {
    pub fn new(app_state: Arc<RwLock<AppState>>, storage: Option<MonitorStorage>) -> Self {
        Self { app_state, storage }
    }

    async fn meta(&self) -> ResponseMeta {
        ResponseMeta::for_state(&*self.app_state.read().await)
    }

    fn storage(&self) -> Result<&MonitorStorage, ApiError> {
        self.storage.as_ref().ok_or(ApiError::StorageDisabled)
    }
}

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub hours: Option<i64>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    #[serde(default)]
    pub hours: Option<i64>,
}

/// Resolve an `hours` parameter to the start of the look-back window.
fn since_hours(hours: i64) -> Result<DateTime<Utc>, ApiError> {
    if hours <= 0 || hours > MAX_HOURS {
        return Err(ApiError::InvalidQuery(format!(
            "hours must be between 1 and {MAX_HOURS}"
        )));
    }
    Ok(Utc::now() - Duration::hours(hours))
}

fn clamp_limit(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).clamp(1, MAX_LIST_LIMIT)
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub system_status: String,
    pub uptime_secs: u64,
    pub storage_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub station_name: String,
    pub status: String,
    pub uptime_secs: u64,
    pub samples_processed: u64,
    pub events_detected: u64,
    pub alerts_sent: u64,
    pub consecutive_failures: u32,
    pub last_sample_time: Option<DateTime<Utc>>,
    pub recent_events: usize,
}

#[derive(Debug, Serialize)]
pub struct CurrentResponse {
    pub sample: Sample,
    pub classification: Option<ClassificationResult>,
    pub description: &'static str,
    pub recommendations: &'static [&'static str],
    pub history: HistoryStatistics,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub hours: i64,
    pub count: usize,
    pub readings: Vec<StoredReading>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub count: usize,
    /// `storage` or `memory`
    pub source: &'static str,
    pub events: Vec<Event>,
}

#[derive(Debug, Serialize)]
pub struct DistributionEntry {
    pub quality: Band,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub hours: i64,
    pub readings: ReadingStatistics,
    pub quality_distribution: Vec<DistributionEntry>,
    pub events: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/health
pub async fn get_health(State(state): State<ApiState>) -> Response {
    let app = state.app_state.read().await;
    let status = match app.status {
        crate::pipeline::SystemStatus::SensorError => "degraded",
        _ => "ok",
    };
    let health = HealthResponse {
        status,
        system_status: app.status.to_string(),
        uptime_secs: app.uptime_secs(),
        storage_enabled: state.storage.is_some(),
    };
    respond(ResponseMeta::for_state(&app), Ok(health))
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<ApiState>) -> Response {
    let app = state.app_state.read().await;
    let status = StatusResponse {
        station_name: app.station_name.clone(),
        status: app.status.to_string(),
        uptime_secs: app.uptime_secs(),
        samples_processed: app.samples_processed,
        events_detected: app.events_detected,
        alerts_sent: app.alerts_sent,
        consecutive_failures: app.consecutive_failures,
        last_sample_time: app.last_sample_time,
        recent_events: app.recent_events.len(),
    };
    respond(ResponseMeta::for_state(&app), Ok(status))
}

/// GET /api/v1/current
///
/// Latest sample with its classification and the rolling-window statistics.
pub async fn get_current(State(state): State<ApiState>) -> Response {
    let app = state.app_state.read().await;
    let current = app.latest_sample.clone().ok_or(ApiError::NoSample).map(|sample| {
        let band = app.latest_classification.map_or(Band::Unknown, |c| c.band);
        CurrentResponse {
            sample,
            classification: app.latest_classification,
            description: band.description(),
            recommendations: band.recommendations(),
            history: app.history_statistics.clone(),
        }
    });
    respond(ResponseMeta::for_state(&app), current)
}

/// GET /api/v1/history?hours=24&limit=100
pub async fn get_history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    respond(state.meta().await, history(&state, &query))
}

fn history(state: &ApiState, query: &HistoryQuery) -> Result<HistoryResponse, ApiError> {
    let storage = state.storage()?;
    let hours = query.hours.unwrap_or(DEFAULT_HOURS);
    let since = since_hours(hours)?;
    let readings = storage.get_readings(TimeRange::since(since), clamp_limit(query.limit, 100))?;
    Ok(HistoryResponse {
        hours,
        count: readings.len(),
        readings,
    })
}

/// GET /api/v1/events?severity=warning&limit=50
///
/// Reads the store when enabled, otherwise the in-memory ring of recent events.
pub async fn get_events(
    State(state): State<ApiState>,
    Query(query): Query<EventsQuery>,
) -> Response {
    let app = state.app_state.read().await;
    respond(ResponseMeta::for_state(&app), events(&state, &app, &query))
}

fn events(state: &ApiState, app: &AppState, query: &EventsQuery) -> Result<EventsResponse, ApiError> {
    let severity = query
        .severity
        .as_deref()
        .map(str::parse::<Severity>)
        .transpose()
        .map_err(ApiError::InvalidQuery)?;
    let limit = clamp_limit(query.limit, 50);

    let (source, events) = match &state.storage {
        Some(storage) => ("storage", storage.get_events(TimeRange::all(), severity, limit)?),
        None => {
            let events: Vec<Event> = app
                .recent_events
                .iter()
                .rev()
                .filter(|e| severity.map_or(true, |s| e.severity == s))
                .take(limit)
                .cloned()
                .collect();
            ("memory", events)
        }
    };
    Ok(EventsResponse {
        count: events.len(),
        source,
        events,
    })
}

/// GET /api/v1/statistics?hours=24
pub async fn get_statistics(
    State(state): State<ApiState>,
    Query(query): Query<StatisticsQuery>,
) -> Response {
    respond(state.meta().await, statistics(&state, &query))
}

fn statistics(state: &ApiState, query: &StatisticsQuery) -> Result<StatisticsResponse, ApiError> {
    let storage = state.storage()?;
    let hours = query.hours.unwrap_or(DEFAULT_HOURS);
    let since = since_hours(hours)?;

    let readings = storage.statistics(TimeRange::since(since))?;
    let distribution = storage.quality_distribution(Some(since))?;
    let events = storage
        .get_events(TimeRange::since(since), None, usize::MAX)?
        .len();

    let total: usize = distribution.iter().map(|(_, n)| n).sum();
    let quality_distribution = distribution
        .into_iter()
        .map(|(quality, count)| DistributionEntry {
            quality,
            count,
            percent: if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            },
        })
        .collect();

    Ok(StatisticsResponse {
        hours,
        readings,
        quality_distribution,
        events,
    })
}
