//! Enrichment of raw readings into per-device status records.

use chrono::{DateTime, Utc};

use super::liveness;
use super::models::{DeviceStatus, Reading};
use super::thresholds::ThresholdConfig;

/// Map latest-per-device readings to enriched status records.
///
/// Input is assumed pre-filtered to one reading per device; output
/// preserves input order. Range evaluation runs for offline devices too,
/// so a stale device still shows its alert state. Only the aggregate
/// counts exclude offline devices.
pub fn resolve(
    readings: &[Reading],
    thresholds: &ThresholdConfig,
    online_threshold_minutes: f64,
    now: DateTime<Utc>,
) -> Vec<DeviceStatus> {
    readings
        .iter()
        .map(|r| resolve_one(r, thresholds, online_threshold_minutes, now))
        .collect()
}

fn resolve_one(
    reading: &Reading,
    thresholds: &ThresholdConfig,
    online_threshold_minutes: f64,
    now: DateTime<Utc>,
) -> DeviceStatus {
    let minutes = liveness::minutes_since(reading.timestamp, now);
    let check = thresholds.evaluate(reading.temperature, reading.humidity);

    DeviceStatus {
        device_id: reading.device_id.clone(),
        device_name: reading.device_name.clone(),
        temperature: reading.temperature,
        humidity: reading.humidity,
        timestamp: reading.timestamp,
        signal_strength: reading.signal_strength,
        signal_to_noise: reading.signal_to_noise,
        battery_level: reading.battery_level,
        location: reading.location,
        is_online: liveness::is_online(reading.timestamp, now, online_threshold_minutes),
        is_within_normal_range: check.is_within_normal_range(),
        temp_alert: check.temp_alert,
        hum_alert: check.hum_alert,
        minutes_since_seen: minutes,
        last_seen: liveness::format_last_seen(reading.timestamp, now),
    }
}
