//! Reduction of device status records into dashboard statistics.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::liveness;
use super::models::{AggregateStats, AlertZone, DeviceStatus};

/// Fold a status list into aggregate statistics.
///
/// Totals count distinct device ids. Alert counting and the temperature
/// average consider online devices only, so a device that went silent with
/// a bad last reading cannot skew the dashboard. Empty input yields zeroed
/// stats, never an error, and `alert_zones` preserves input order.
pub fn aggregate(statuses: &[DeviceStatus]) -> AggregateStats {
    let total_devices = statuses
        .iter()
        .map(|s| s.device_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    let online: Vec<&DeviceStatus> = statuses.iter().filter(|s| s.is_online).collect();
    let online_devices = online.len();

    let alert_zones: Vec<AlertZone> = statuses
        .iter()
        .filter(|s| s.is_online && !s.is_within_normal_range)
        .map(|s| AlertZone {
            name: s.device_name.clone(),
            temp: s.temperature,
            hum: s.humidity,
            temp_alert: s.temp_alert,
            hum_alert: s.hum_alert,
        })
        .collect();

    let average_temperature = if online.is_empty() {
        0.0
    } else {
        let sum: f64 = online.iter().map(|s| s.temperature).sum();
        round_one_decimal(sum / online.len() as f64)
    };

    AggregateStats {
        total_devices,
        online_devices,
        offline_devices: total_devices.saturating_sub(online_devices),
        alerts_count: alert_zones.len(),
        average_temperature,
        alert_zones,
    }
}

/// Devices stale beyond the notification threshold, recomputed against
/// `now` rather than the snapshot's own pass instant.
///
/// This threshold is distinct from (and larger than) the dashboard's
/// online window; two hours by default, so the notification channel only
/// fires for sustained outages. Devices that have never reported are
/// always included.
pub fn offline_devices(
    statuses: &[DeviceStatus],
    threshold_minutes: f64,
    now: DateTime<Utc>,
) -> Vec<DeviceStatus> {
    statuses
        .iter()
        .filter(|s| liveness::minutes_since(s.timestamp, now) > threshold_minutes)
        .cloned()
        .collect()
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
