//! Configuration module for ThermoWatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

use crate::fetch::RetryPolicy;
use crate::status::{Bounds, ThresholdConfig, DEFAULT_ONLINE_THRESHOLD_MINUTES};

/// Sensor device EUIs monitored when no explicit list is configured.
pub const DEFAULT_DEVICE_EUIS: [&str; 6] = [
    "a8404151518379f9",
    "a8404181e18379fd",
    "a8404152a1837a0e",
    "a840417eb1837a01",
    "a84041c2718379fe",
    "a84041b931837a0a",
];

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Readings endpoint URL (default: "http://localhost:3000/api/lastEntries")
    pub readings_url: String,
    /// Seconds between scheduled refreshes (default: 300)
    pub refresh_interval_secs: u64,
    /// Hard timeout for one fetch attempt, in seconds (default: 60)
    pub fetch_timeout_secs: u64,
    /// Retries after a timed-out attempt (default: 2)
    pub fetch_max_retries: u32,
    /// Delay between retries, in seconds (default: 5)
    pub fetch_retry_delay_secs: u64,
    /// Minutes of silence before a device counts as offline (default: 10)
    pub online_threshold_minutes: f64,
    /// Minutes of silence before a device is notification-worthy (default: 120)
    pub notify_threshold_minutes: f64,
    /// Device EUIs in scope; empty disables filtering
    pub device_euis: Vec<String>,
    /// Alert thresholds for temperature and humidity
    pub thresholds: ThresholdConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            readings_url: "http://localhost:3000/api/lastEntries".to_string(),
            refresh_interval_secs: 300,
            fetch_timeout_secs: 60,
            fetch_max_retries: 2,
            fetch_retry_delay_secs: 5,
            online_threshold_minutes: DEFAULT_ONLINE_THRESHOLD_MINUTES,
            notify_threshold_minutes: 120.0,
            device_euis: DEFAULT_DEVICE_EUIS.iter().map(|s| s.to_string()).collect(),
            thresholds: ThresholdConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `THERMOWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `THERMOWATCH_READINGS_URL`: readings endpoint URL
    /// - `THERMOWATCH_REFRESH_INTERVAL_SECS`: seconds between refreshes (default: 300)
    /// - `THERMOWATCH_FETCH_TIMEOUT_SECS`: per-attempt timeout (default: 60)
    /// - `THERMOWATCH_FETCH_MAX_RETRIES`: retries after timeout (default: 2)
    /// - `THERMOWATCH_FETCH_RETRY_DELAY_SECS`: delay between retries (default: 5)
    /// - `THERMOWATCH_ONLINE_THRESHOLD_MINUTES`: offline cutoff (default: 10)
    /// - `THERMOWATCH_NOTIFY_THRESHOLD_MINUTES`: notification cutoff (default: 120)
    /// - `THERMOWATCH_DEVICE_EUIS`: comma-separated EUIs; empty disables filtering
    /// - `THERMOWATCH_TEMP_RANGE`: "min,max" temperature bounds (default: "18,25")
    /// - `THERMOWATCH_HUM_RANGE`: "min,max" humidity bounds (default: "40,60")
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("THERMOWATCH_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(url) = env::var("THERMOWATCH_READINGS_URL") {
            cfg.readings_url = url;
        }

        if let Ok(secs_str) = env::var("THERMOWATCH_REFRESH_INTERVAL_SECS") {
            if let Ok(secs) = secs_str.parse() {
                cfg.refresh_interval_secs = secs;
            }
        }

        if let Ok(secs_str) = env::var("THERMOWATCH_FETCH_TIMEOUT_SECS") {
            if let Ok(secs) = secs_str.parse() {
                cfg.fetch_timeout_secs = secs;
            }
        }

        if let Ok(retries_str) = env::var("THERMOWATCH_FETCH_MAX_RETRIES") {
            if let Ok(retries) = retries_str.parse() {
                cfg.fetch_max_retries = retries;
            }
        }

        if let Ok(secs_str) = env::var("THERMOWATCH_FETCH_RETRY_DELAY_SECS") {
            if let Ok(secs) = secs_str.parse() {
                cfg.fetch_retry_delay_secs = secs;
            }
        }

        if let Ok(minutes_str) = env::var("THERMOWATCH_ONLINE_THRESHOLD_MINUTES") {
            if let Ok(minutes) = minutes_str.parse() {
                cfg.online_threshold_minutes = minutes;
            }
        }

        if let Ok(minutes_str) = env::var("THERMOWATCH_NOTIFY_THRESHOLD_MINUTES") {
            if let Ok(minutes) = minutes_str.parse() {
                cfg.notify_threshold_minutes = minutes;
            }
        }

        if let Ok(list) = env::var("THERMOWATCH_DEVICE_EUIS") {
            cfg.device_euis = parse_device_list(&list);
        }

        if let Ok(range) = env::var("THERMOWATCH_TEMP_RANGE") {
            if let Some(bounds) = parse_range(&range) {
                cfg.thresholds.temperature = Some(bounds);
            }
        }

        if let Ok(range) = env::var("THERMOWATCH_HUM_RANGE") {
            if let Some(bounds) = parse_range(&range) {
                cfg.thresholds.humidity = Some(bounds);
            }
        }

        cfg
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_retries: self.fetch_max_retries,
            retry_delay: Duration::from_secs(self.fetch_retry_delay_secs),
        }
    }
}

/// Parse a "min,max" pair.
fn parse_range(s: &str) -> Option<Bounds> {
    let (min, max) = s.split_once(',')?;
    let min = min.trim().parse().ok()?;
    let max = max.trim().parse().ok()?;

    Some(Bounds::new(min, max))
}

/// Parse a comma-separated device list, dropping empty entries.
fn parse_device_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|eui| eui.trim().to_string())
        .filter(|eui| !eui.is_empty())
        .collect()
}
