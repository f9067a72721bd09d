//! API route definitions
//!
//! - /api/v1/health     - liveness and pipeline status
//! - /api/v1/status     - station counters
//! - /api/v1/current    - latest sample, classification, window statistics
//! - /api/v1/history    - stored readings
//! - /api/v1/events     - detected pollution events
//! - /api/v1/statistics - aggregates and quality distribution

use axum::{routing::get, Router};

use super::handlers::{self, ApiState};

/// Create all `/api/v1` routes
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/status", get(handlers::get_status))
        .route("/current", get(handlers::get_current))
        .route("/history", get(handlers::get_history))
        .route("/events", get(handlers::get_events))
        .route("/statistics", get(handlers::get_statistics))
        .with_state(state)
}
