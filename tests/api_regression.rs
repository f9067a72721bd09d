//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! all /api/v1/* endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use aquasentinel::api::{create_app, ApiState};
use aquasentinel::classifier::Classifier;
use aquasentinel::config::ThresholdConfig;
use aquasentinel::pipeline::{AppState, SystemStatus};
use aquasentinel::{Analyzer, Event, EventType, MonitorStorage, Sample, Severity};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceExt;

fn memory_state() -> ApiState {
    ApiState::new(Arc::new(RwLock::new(AppState::new("Test Station"))), None)
}

fn storage_state() -> (tempfile::TempDir, ApiState) {
    let dir = tempfile::tempdir().unwrap();
    let storage = MonitorStorage::open(dir.path().join("api.db")).unwrap();
    let classifier = Classifier::new(ThresholdConfig::default());
    let now = Utc::now();

    for i in 0..5 {
        let s = Sample::at(
            Some(7.2),
            Some(3.0 + i as f64),
            Some(20.0),
            now - Duration::minutes(10 - i),
        );
        storage.save_reading(&s, &classifier.classify(&s)).unwrap();
    }
    storage.save_event(&event(Severity::Warning, now - Duration::minutes(5))).unwrap();
    storage.save_event(&event(Severity::Critical, now - Duration::minutes(4))).unwrap();

    let app_state = Arc::new(RwLock::new(AppState::new("Test Station")));
    (dir, ApiState::new(app_state, Some(storage)))
}

fn event(severity: Severity, timestamp: chrono::DateTime<Utc>) -> Event {
    let event_type = match severity {
        Severity::Critical => EventType::TurbidityCritical,
        _ => EventType::TurbidityHigh,
    };
    Event {
        event_type,
        severity,
        description: format!("{event_type} test event"),
        ph: Some(7.2),
        turbidity: Some(120.0),
        temperature: Some(20.0),
        timestamp,
    }
}

async fn get(state: ApiState, uri: &str) -> (StatusCode, serde_json::Value) {
    let resp = create_app(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

// ============================================================================
// Status Endpoints
// ============================================================================

#[tokio::test]
async fn test_v1_get_endpoints_with_storage_return_200() {
    let (_dir, state) = storage_state();
    let endpoints = [
        "/api/v1/health",
        "/api/v1/status",
        "/api/v1/history",
        "/api/v1/events",
        "/api/v1/statistics",
    ];
    for endpoint in &endpoints {
        let (status, json) = get(state.clone(), endpoint).await;
        assert_eq!(status, StatusCode::OK, "GET {endpoint}");
        assert!(json["data"].is_object(), "GET {endpoint} missing data");
        assert_eq!(json["meta"]["api_version"], "1");
        assert_eq!(json["meta"]["station"], "Test Station");
    }
}

#[tokio::test]
async fn test_health_reports_storage_and_status() {
    let state = memory_state();
    let (status, json) = get(state.clone(), "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["storage_enabled"], false);

    state.app_state.write().await.status = SystemStatus::SensorError;
    let (_, json) = get(state, "/api/v1/health").await;
    assert_eq!(json["data"]["status"], "degraded");
    assert_eq!(json["data"]["system_status"], "Sensor Error");
}

#[tokio::test]
async fn test_status_reflects_counters() {
    let state = memory_state();
    {
        let mut app = state.app_state.write().await;
        app.status = SystemStatus::Monitoring;
        app.samples_processed = 42;
        app.alerts_sent = 3;
        app.push_event(event(Severity::Warning, Utc::now()));
    }
    let (status, json) = get(state, "/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["meta"]["samples_processed"], 42);
    let data = &json["data"];
    assert_eq!(data["station_name"], "Test Station");
    assert_eq!(data["status"], "Monitoring");
    assert_eq!(data["samples_processed"], 42);
    assert_eq!(data["events_detected"], 1);
    assert_eq!(data["alerts_sent"], 3);
    assert_eq!(data["recent_events"], 1);
}

// ============================================================================
// Current Reading
// ============================================================================

#[tokio::test]
async fn test_current_before_first_sample_is_unavailable() {
    let (status, json) = get(memory_state(), "/api/v1/current").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "NO_SAMPLE");
}

#[tokio::test]
async fn test_current_returns_latest_classification() {
    let state = memory_state();
    let sample = Sample::new(Some(7.1), Some(12.0), Some(21.0));
    let classification = Classifier::new(ThresholdConfig::default()).classify(&sample);
    let mut analyzer = Analyzer::default();
    analyzer.analyze(&sample);
    {
        let mut app = state.app_state.write().await;
        app.latest_sample = Some(sample);
        app.latest_classification = Some(classification);
        app.history_statistics = analyzer.statistics();
    }

    let (status, json) = get(state, "/api/v1/current").await;
    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(data["sample"]["pH"], 7.1);
    assert_eq!(data["classification"]["class"], "fair");
    assert!(data["description"].as_str().unwrap().contains("fair"));
    assert!(data["recommendations"].as_array().is_some_and(|r| !r.is_empty()));
    assert_eq!(data["history"]["turbidity"]["count"], 1);
}

// ============================================================================
// History, Events, Statistics
// ============================================================================

#[tokio::test]
async fn test_history_returns_newest_first_with_limit() {
    let (_dir, state) = storage_state();
    let (status, json) = get(state, "/api/v1/history?hours=1&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(data["count"], 2);
    assert_eq!(data["readings"][0]["turbidity"], 7.0);
    assert_eq!(data["readings"][1]["turbidity"], 6.0);
    assert_eq!(data["readings"][0]["quality_class"], "good");
}

#[tokio::test]
async fn test_history_rejects_bad_hours() {
    let (_dir, state) = storage_state();
    for uri in ["/api/v1/history?hours=0", "/api/v1/history?hours=-3", "/api/v1/history?hours=999999"] {
        let (status, json) = get(state.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "GET {uri}");
        assert_eq!(json["error"]["code"], "INVALID_QUERY");
        assert_eq!(json["meta"]["station"], "Test Station");
    }
}

#[tokio::test]
async fn test_events_from_storage_filtered_by_severity() {
    let (_dir, state) = storage_state();

    let (_, all) = get(state.clone(), "/api/v1/events").await;
    assert_eq!(all["data"]["source"], "storage");
    assert_eq!(all["data"]["count"], 2);
    assert_eq!(all["data"]["events"][0]["severity"], "critical");

    let (_, warnings) = get(state, "/api/v1/events?severity=warning").await;
    assert_eq!(warnings["data"]["count"], 1);
    assert_eq!(warnings["data"]["events"][0]["event_type"], "turbidity_high");
}

#[tokio::test]
async fn test_events_reject_unknown_severity() {
    let (status, json) = get(memory_state(), "/api/v1/events?severity=apocalyptic").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "INVALID_QUERY");
}

#[tokio::test]
async fn test_events_fall_back_to_memory_ring() {
    let state = memory_state();
    {
        let mut app = state.app_state.write().await;
        app.push_event(event(Severity::Warning, Utc::now() - Duration::minutes(1)));
        app.push_event(event(Severity::Critical, Utc::now()));
    }
    let (status, json) = get(state, "/api/v1/events?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["source"], "memory");
    assert_eq!(json["data"]["count"], 1);
    assert_eq!(json["data"]["events"][0]["severity"], "critical");
}

#[tokio::test]
async fn test_statistics_summarise_window() {
    let (_dir, state) = storage_state();
    let (status, json) = get(state, "/api/v1/statistics?hours=24").await;
    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(data["readings"]["count"], 5);
    assert_eq!(data["readings"]["turbidity"]["max"], 7.0);
    assert_eq!(data["events"], 2);

    let distribution = data["quality_distribution"].as_array().unwrap();
    let total: u64 = distribution.iter().map(|d| d["count"].as_u64().unwrap()).sum();
    assert_eq!(total, 5);
    assert_eq!(distribution[0]["quality"], "excellent");
}

#[tokio::test]
async fn test_storage_endpoints_without_storage_are_unavailable() {
    for uri in ["/api/v1/history", "/api/v1/statistics"] {
        let (status, json) = get(memory_state(), uri).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "GET {uri}");
        assert_eq!(json["error"]["code"], "STORAGE_DISABLED");
    }
}
