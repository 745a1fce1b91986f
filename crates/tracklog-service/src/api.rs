//! HTTP control API for the UI layer.
//!
//! The excluded UI only needs a narrow surface: read the pending count
//! and the last sync summary, start/stop tracking, and request a manual
//! drain. Individual per-sample failures are not exposed; they self-heal
//! on the next successful drain.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use time::OffsetDateTime;

use crate::sampler::Sampler;
use crate::state::AppState;
use crate::sync::SyncSummary;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Health and status
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        // Manual sync
        .route("/api/sync", post(sync_now))
        // Tracking control
        .route("/api/tracking/start", post(tracking_start))
        .route("/api/tracking/stop", post(tracking_stop))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Service status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service version.
    pub version: &'static str,
    /// Current timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Tracker status.
    pub tracker: TrackerStatus,
    /// Last observed network reachability.
    pub reachable: bool,
    /// Events waiting for delivery.
    pub pending: u64,
    /// Summary of the most recent drain pass.
    pub last_sync: Option<SyncSummary>,
}

/// Tracker status.
#[derive(Debug, Serialize)]
pub struct TrackerStatus {
    /// Whether tracking is running.
    pub running: bool,
    /// When tracking was started (if running).
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    /// How long tracking has been running (in seconds).
    pub uptime_seconds: Option<u64>,
}

/// Get service status including the pending count and last sync summary.
async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, AppError> {
    let running = state.tracker.is_running();
    let started_at = state.tracker.started_at();
    let uptime_seconds = started_at.map(|s| {
        let now = OffsetDateTime::now_utc();
        (now - s).whole_seconds().max(0) as u64
    });

    let pending = {
        let store = state.store.lock().await;
        store.count_unsynced()?
    };

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
        tracker: TrackerStatus {
            running,
            started_at,
            uptime_seconds,
        },
        reachable: state.sync.is_reachable(),
        pending,
        last_sync: state.sync.last_summary().await,
    }))
}

/// Run a drain pass now and return its summary.
///
/// If a pass is already in flight the request coalesces into it and the
/// summary says so.
async fn sync_now(State(state): State<Arc<AppState>>) -> Json<SyncSummary> {
    Json(crate::sync::drain(&state).await)
}

/// Response for tracking control actions.
#[derive(Debug, Serialize)]
pub struct TrackingActionResponse {
    pub success: bool,
    pub message: String,
    pub running: bool,
}

/// Start tracking.
async fn tracking_start(State(state): State<Arc<AppState>>) -> Json<TrackingActionResponse> {
    if state.tracker.is_running() {
        return Json(TrackingActionResponse {
            success: false,
            message: "Tracking is already running".to_string(),
            running: true,
        });
    }

    let sampler = Sampler::new(Arc::clone(&state));
    sampler.start().await;
    crate::monitor::start(Arc::clone(&state)).await;
    crate::sync::start_sweep(Arc::clone(&state)).await;

    Json(TrackingActionResponse {
        success: true,
        message: "Tracking started".to_string(),
        running: true,
    })
}

/// Stop tracking.
///
/// Soft cancellation: the stop signal is observed between iterations, so
/// an in-flight delivery attempt completes before its loop exits.
async fn tracking_stop(State(state): State<Arc<AppState>>) -> Json<TrackingActionResponse> {
    if !state.tracker.is_running() {
        return Json(TrackingActionResponse {
            success: false,
            message: "Tracking is not running".to_string(),
            running: false,
        });
    }

    state.tracker.signal_stop();

    Json(TrackingActionResponse {
        success: true,
        message: "Tracking stopped".to_string(),
        running: false,
    })
}

/// API error responses.
#[derive(Debug)]
pub enum AppError {
    Internal(String),
}

impl From<tracklog_store::Error> for AppError {
    fn from(e: tracklog_store::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
