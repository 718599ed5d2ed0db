//! Threshold evaluation for sensor readings.

use serde::{Deserialize, Serialize};

/// An inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether a value lies within the range, both ends inclusive.
    ///
    /// Inverted bounds (min > max) are accepted as given and match nothing;
    /// the configuration source is trusted.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Organization-wide alert thresholds.
///
/// A `None` axis means no threshold is configured and evaluates as in
/// range, so configuration gaps never raise spurious alerts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub temperature: Option<Bounds>,
    pub humidity: Option<Bounds>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            temperature: Some(Bounds::new(18.0, 25.0)),
            humidity: Some(Bounds::new(40.0, 60.0)),
        }
    }
}

/// Per-axis alert flags for one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeCheck {
    pub temp_alert: bool,
    pub hum_alert: bool,
}

impl RangeCheck {
    pub fn is_within_normal_range(&self) -> bool {
        !self.temp_alert && !self.hum_alert
    }
}

impl ThresholdConfig {
    /// Evaluate a temperature/humidity pair against the configured bounds.
    ///
    /// Total: always returns a definite flag pair, with unconfigured axes
    /// counting as in range.
    pub fn evaluate(&self, temperature: f64, humidity: f64) -> RangeCheck {
        let temp_ok = self.temperature.map_or(true, |b| b.contains(temperature));
        let hum_ok = self.humidity.map_or(true, |b| b.contains(humidity));

        RangeCheck {
            temp_alert: !temp_ok,
            hum_alert: !hum_ok,
        }
    }
}
