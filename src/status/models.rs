//! Core model types for readings and derived status.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Geographic position reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// The latest telemetry sample for one device.
///
/// Produced by the fetch layer after coercion, so numeric fields are always
/// present (malformed values arrive as 0) and the timestamp is `None` when
/// the upstream value was missing or unparsable.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub device_id: String,
    pub device_name: String,
    pub temperature: f64,
    pub humidity: f64,
    pub timestamp: Option<DateTime<Utc>>,
    /// Received signal strength, display only.
    pub signal_strength: Option<f64>,
    /// Signal-to-noise ratio, display only.
    pub signal_to_noise: Option<f64>,
    /// Battery percentage, display only.
    pub battery_level: Option<f64>,
    pub location: Option<GeoPoint>,
}

/// One device's enriched state for the current aggregation pass.
///
/// Rebuilt wholesale on every refresh, never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub device_id: String,
    pub device_name: String,
    pub temperature: f64,
    pub humidity: f64,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_to_noise: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    pub is_online: bool,
    pub is_within_normal_range: bool,
    pub temp_alert: bool,
    pub hum_alert: bool,
    /// Whole minutes since the reading was produced; infinite when never seen.
    pub minutes_since_seen: f64,
    /// Relative label for display, e.g. "5m ago" or "Never".
    pub last_seen: String,
}

/// Per-device alert detail for the dashboard's alert list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertZone {
    pub name: String,
    pub temp: f64,
    pub hum: f64,
    pub temp_alert: bool,
    pub hum_alert: bool,
}

/// Summary statistics over one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_devices: usize,
    pub online_devices: usize,
    pub offline_devices: usize,
    pub alerts_count: usize,
    pub average_temperature: f64,
    pub alert_zones: Vec<AlertZone>,
}

/// The shared view served to consumers: current devices and stats plus the
/// most recent fetch error, if any.
///
/// A failed refresh keeps the last good data and records the error
/// alongside it, never in place of it.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub devices: Vec<DeviceStatus>,
    pub stats: AggregateStats,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}
