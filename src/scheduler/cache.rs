//! Shared cache for the most recent status snapshot.
//!
//! Refresh cycles commit into the cache under a generation check so a
//! slow cycle that was superseded by a newer one can never overwrite
//! fresher data. Failed cycles record the error but keep the last good
//! snapshot visible.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::status::{AggregateStats, DeviceStatus, StatusSnapshot};

/// Last-known-good snapshot plus the generation counter that gates writes.
pub struct StatusCache {
    snapshot: RwLock<StatusSnapshot>,
    generation: AtomicU64,
}

impl StatusCache {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(StatusSnapshot::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Clone of the current snapshot.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.snapshot.read().unwrap().clone()
    }

    /// Claim a new generation, invalidating any commit still in flight.
    pub fn advance_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Commit a refreshed snapshot. Returns false if `generation` is no
    /// longer current and the result was discarded.
    pub fn apply_success(
        &self,
        devices: Vec<DeviceStatus>,
        stats: AggregateStats,
        now: DateTime<Utc>,
        generation: u64,
    ) -> bool {
        let mut snapshot = self.snapshot.write().unwrap();
        if generation != self.generation.load(Ordering::SeqCst) {
            tracing::debug!("Cache: discarding stale refresh (generation {})", generation);
            return false;
        }

        snapshot.devices = devices;
        snapshot.stats = stats;
        snapshot.last_updated = Some(now);
        snapshot.last_error = None;
        true
    }

    /// Record a failed refresh, keeping the previous data visible.
    pub fn apply_error(&self, message: String, generation: u64) -> bool {
        let mut snapshot = self.snapshot.write().unwrap();
        if generation != self.generation.load(Ordering::SeqCst) {
            tracing::debug!("Cache: discarding stale error (generation {})", generation);
            return false;
        }

        snapshot.last_error = Some(message);
        true
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    use crate::status::{aggregate, resolve, Reading, ThresholdConfig};

    fn sample_devices(now: DateTime<Utc>) -> (Vec<DeviceStatus>, AggregateStats) {
        let readings = vec![Reading {
            device_id: "a8404151518379f9".to_string(),
            device_name: "Cold Room 1".to_string(),
            temperature: 21.0,
            humidity: 50.0,
            timestamp: Some(now),
            signal_strength: None,
            signal_to_noise: None,
            battery_level: None,
            location: None,
        }];
        let devices = resolve(&readings, &ThresholdConfig::default(), 10.0, now);
        let stats = aggregate(&devices);
        (devices, stats)
    }

    #[test]
    fn test_commit_and_snapshot() {
        let cache = StatusCache::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let (devices, stats) = sample_devices(now);

        let generation = cache.advance_generation();
        assert!(cache.apply_success(devices, stats, now, generation));

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.devices.len(), 1);
        assert_eq!(snapshot.stats.online_devices, 1);
        assert_eq!(snapshot.last_updated, Some(now));
        assert_eq!(snapshot.last_error, None);
    }

    #[test]
    fn test_stale_generation_is_discarded() {
        let cache = StatusCache::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let (devices, stats) = sample_devices(now);

        let stale = cache.advance_generation();
        let current = cache.advance_generation();

        assert!(!cache.apply_success(devices.clone(), stats.clone(), now, stale));
        assert_eq!(cache.snapshot().devices.len(), 0);

        assert!(cache.apply_success(devices, stats, now, current));
        assert_eq!(cache.snapshot().devices.len(), 1);
    }

    #[test]
    fn test_error_keeps_last_good_data() {
        let cache = StatusCache::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let (devices, stats) = sample_devices(now);

        let generation = cache.advance_generation();
        assert!(cache.apply_success(devices, stats, now, generation));

        let generation = cache.advance_generation();
        assert!(cache.apply_error("request timed out after 60s".to_string(), generation));

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.devices.len(), 1);
        assert_eq!(snapshot.last_updated, Some(now));
        assert_eq!(
            snapshot.last_error.as_deref(),
            Some("request timed out after 60s")
        );
    }

    #[test]
    fn test_success_clears_previous_error() {
        let cache = StatusCache::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let (devices, stats) = sample_devices(now);

        let generation = cache.advance_generation();
        assert!(cache.apply_error("upstream reported failure".to_string(), generation));
        assert!(cache.snapshot().last_error.is_some());

        let generation = cache.advance_generation();
        assert!(cache.apply_success(devices, stats, now, generation));
        assert_eq!(cache.snapshot().last_error, None);
    }

    #[test]
    fn test_snapshot_serializes_with_wire_names() {
        let cache = StatusCache::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let (devices, stats) = sample_devices(now);

        let generation = cache.advance_generation();
        cache.apply_success(devices, stats, now, generation);

        let value = serde_json::to_value(cache.snapshot()).unwrap();
        let object: &serde_json::Map<String, serde_json::Value> = value.as_object().unwrap();
        assert!(object.contains_key("lastUpdated"));
        assert!(object["stats"].as_object().unwrap().contains_key("averageTemperature"));

        let device: HashMap<String, serde_json::Value> =
            serde_json::from_value(object["devices"][0].clone()).unwrap();
        assert!(device.contains_key("deviceId"));
        assert!(device.contains_key("isOnline"));
        assert!(device.contains_key("minutesSinceSeen"));
    }
}
