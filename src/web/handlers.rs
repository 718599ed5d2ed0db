//! HTTP request handlers.

use super::AppState;
use crate::scheduler::{CycleOutcome, Phase};
use crate::status::{self, DeviceStatus};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// API: Status
// ============================================================================

/// Full snapshot: devices, aggregate stats, freshness, last error.
pub async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.snapshot())
}

/// Just the per-device entries.
pub async fn handle_get_devices(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.snapshot().devices)
}

#[derive(Debug, Deserialize)]
pub struct OfflineQuery {
    #[serde(default)]
    pub threshold_minutes: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineResponse {
    pub count: usize,
    pub threshold_minutes: f64,
    pub devices: Vec<DeviceStatus>,
}

/// Devices silent for longer than the threshold, evaluated against the
/// current clock rather than the snapshot's.
pub async fn handle_get_offline(
    State(state): State<AppState>,
    Query(query): Query<OfflineQuery>,
) -> impl IntoResponse {
    let threshold = query
        .threshold_minutes
        .unwrap_or(state.config.notify_threshold_minutes);
    let snapshot = state.cache.snapshot();
    let devices = status::offline_devices(&snapshot.devices, threshold, Utc::now());

    Json(OfflineResponse {
        count: devices.len(),
        threshold_minutes: threshold,
        devices,
    })
}

// ============================================================================
// API: Refresh
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn handle_refresh(State(state): State<AppState>) -> impl IntoResponse {
    match state.scheduler.manual_refresh().await {
        CycleOutcome::Refreshed => Json(RefreshResponse {
            status: "refreshed",
            last_updated: state.cache.snapshot().last_updated,
            error: None,
        })
        .into_response(),
        CycleOutcome::Failed(message) => (
            StatusCode::BAD_GATEWAY,
            Json(RefreshResponse {
                status: "error",
                last_updated: None,
                error: Some(message),
            }),
        )
            .into_response(),
        CycleOutcome::Cancelled => Json(RefreshResponse {
            status: "cancelled",
            last_updated: None,
            error: None,
        })
        .into_response(),
        CycleOutcome::Superseded => Json(RefreshResponse {
            status: "superseded",
            last_updated: None,
            error: None,
        })
        .into_response(),
    }
}

// ============================================================================
// API: Scheduler control
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerResponse {
    pub phase: Phase,
    pub interval_secs: u64,
}

fn scheduler_response(state: &AppState) -> SchedulerResponse {
    SchedulerResponse {
        phase: state.scheduler.phase(),
        interval_secs: state.scheduler.interval().as_secs(),
    }
}

pub async fn handle_get_scheduler(State(state): State<AppState>) -> impl IntoResponse {
    Json(scheduler_response(&state))
}

/// Arm the periodic timer at the currently configured interval.
pub async fn handle_start_scheduler(State(state): State<AppState>) -> impl IntoResponse {
    let interval = state.scheduler.interval();
    state.scheduler.clone().start(interval);
    Json(scheduler_response(&state))
}

pub async fn handle_stop_scheduler(State(state): State<AppState>) -> impl IntoResponse {
    state.scheduler.stop();
    Json(scheduler_response(&state))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalRequest {
    pub interval_secs: u64,
}

pub async fn handle_change_interval(
    State(state): State<AppState>,
    Json(req): Json<IntervalRequest>,
) -> impl IntoResponse {
    if req.interval_secs == 0 {
        return (StatusCode::BAD_REQUEST, "interval must be at least 1 second").into_response();
    }

    state
        .scheduler
        .clone()
        .change_interval(Duration::from_secs(req.interval_secs));
    Json(scheduler_response(&state)).into_response()
}
