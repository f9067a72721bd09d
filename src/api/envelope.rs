//! Response envelope for the `/api/v1` endpoints
//!
//! Successful calls answer `{data, meta}`, failed ones `{error, meta}`.
//! `meta` identifies the station and how far its monitor loop has got, so a
//! dashboard polling several stations can tell answers apart and spot a
//! stalled loop without a second request.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::pipeline::AppState;
use crate::storage::StorageError;

pub const API_VERSION: &str = "1";

/// Station context attached to every response.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseMeta {
    pub station: String,
    pub samples_processed: u64,
    pub last_sample_time: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
    pub api_version: &'static str,
}

impl ResponseMeta {
    pub fn for_state(app: &AppState) -> Self {
        Self {
            station: app.station_name.clone(),
            samples_processed: app.samples_processed,
            last_sample_time: app.last_sample_time,
            generated_at: Utc::now(),
            api_version: API_VERSION,
        }
    }
}

/// Reasons a handler cannot answer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidQuery(String),

    #[error("No sample received yet")]
    NoSample,

    #[error("Storage is disabled")]
    StorageDisabled,

    #[error("Storage query failed")]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::NoSample | ApiError::StorageDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidQuery(_) => "INVALID_QUERY",
            ApiError::NoSample => "NO_SAMPLE",
            ApiError::StorageDisabled => "STORAGE_DISABLED",
            ApiError::Storage(_) => "STORAGE_FAILURE",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct DataBody<T> {
    data: T,
    meta: ResponseMeta,
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    meta: ResponseMeta,
}

/// Render a handler outcome inside the envelope.
pub fn respond<T: Serialize>(meta: ResponseMeta, outcome: Result<T, ApiError>) -> Response {
    match outcome {
        Ok(data) => (StatusCode::OK, Json(DataBody { data, meta })).into_response(),
        Err(err) => {
            if let ApiError::Storage(source) = &err {
                warn!(error = %source, station = %meta.station, "Storage query failed");
            }
            let body = ErrorBody {
                error: ErrorDetail {
                    code: err.code(),
                    message: err.to_string(),
                },
                meta,
            };
            (err.status(), Json(body)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ResponseMeta {
        let mut app = AppState::new("Weir Gauge");
        app.samples_processed = 12;
        ResponseMeta::for_state(&app)
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_data_carries_station_meta() {
        let resp = respond(meta(), Ok::<_, ApiError>(serde_json::json!({"ok": true})));
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["data"]["ok"], true);
        assert_eq!(json["meta"]["station"], "Weir Gauge");
        assert_eq!(json["meta"]["samples_processed"], 12);
        assert!(json["meta"]["last_sample_time"].is_null());
        assert_eq!(json["meta"]["api_version"], API_VERSION);
    }

    #[tokio::test]
    async fn test_error_codes_and_status() {
        let cases = [
            (
                ApiError::InvalidQuery("hours must be positive".into()),
                StatusCode::BAD_REQUEST,
                "INVALID_QUERY",
            ),
            (ApiError::NoSample, StatusCode::SERVICE_UNAVAILABLE, "NO_SAMPLE"),
            (ApiError::StorageDisabled, StatusCode::SERVICE_UNAVAILABLE, "STORAGE_DISABLED"),
        ];
        for (err, status, code) in cases {
            let message = err.to_string();
            let resp = respond::<()>(meta(), Err(err));
            assert_eq!(resp.status(), status);
            let json = body_json(resp).await;
            assert_eq!(json["error"]["code"], code);
            assert_eq!(json["error"]["message"], message);
            assert_eq!(json["meta"]["station"], "Weir Gauge");
            assert!(json.get("data").is_none());
        }
    }

    #[tokio::test]
    async fn test_storage_failure_hides_source_detail() {
        let source = std::io::Error::other("disk at /var/lib/aqua full");
        let resp = respond::<()>(meta(), Err(ApiError::from(StorageError::from(source))));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "STORAGE_FAILURE");
        assert_eq!(json["error"]["message"], "Storage query failed");
    }
}
