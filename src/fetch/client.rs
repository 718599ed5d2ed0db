//! HTTP client for the latest-readings endpoint.
//!
//! The upstream returns loosely-shaped JSON; everything is coerced into
//! typed [`Reading`]s here, before it reaches the pure status logic.
//! Malformed numeric fields fall back to 0 instead of rejecting the batch,
//! since one bad device must not blank the dashboard for the rest.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::FetchError;
use crate::status::{GeoPoint, Reading};

/// Abstract source of latest-per-device readings.
///
/// The scheduler depends on this trait rather than the HTTP client so
/// tests can substitute an in-memory source.
pub trait ReadingsSource: Send + Sync {
    fn fetch_latest(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Reading>, FetchError>> + Send + '_>>;
}

/// Envelope returned by the readings endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Vec<RawReading>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// One reading as it appears on the wire, before coercion.
///
/// Numeric fields stay as raw JSON values because the upstream sometimes
/// delivers them as strings.
#[derive(Debug, Deserialize)]
struct RawReading {
    #[serde(rename = "devEUI", default)]
    dev_eui: Option<String>,
    #[serde(rename = "deviceName", default)]
    device_name: Option<String>,
    #[serde(default)]
    temperature: Option<Value>,
    #[serde(default)]
    humidity: Option<Value>,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    rssi: Option<Value>,
    #[serde(default)]
    snr: Option<Value>,
    #[serde(rename = "batteryLevel", default)]
    battery_level: Option<Value>,
    #[serde(default)]
    location: Option<Value>,
}

/// Client for the upstream latest-readings endpoint.
pub struct ReadingsClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    allowed_devices: HashSet<String>,
}

impl ReadingsClient {
    /// Build a client for the given endpoint.
    ///
    /// `allowed_devices` bounds which readings are in scope; an empty list
    /// disables filtering.
    pub fn new(
        url: &str,
        timeout: Duration,
        allowed_devices: &[String],
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            timeout,
            allowed_devices: allowed_devices.iter().cloned().collect(),
        })
    }

    /// GET the endpoint, validate the envelope, and coerce the payload.
    async fn fetch(&self) -> Result<Vec<Reading>, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        let envelope: Envelope = response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Decode(e.to_string())
            }
        })?;

        if !envelope.success {
            let reason = envelope
                .error
                .or(envelope.message)
                .unwrap_or_else(|| "upstream reported failure".to_string());
            return Err(FetchError::Api(reason));
        }

        let readings: Vec<Reading> = envelope.data.iter().map(coerce_reading).collect();
        Ok(filter_allowed(readings, &self.allowed_devices))
    }

    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

impl ReadingsSource for ReadingsClient {
    fn fetch_latest(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Reading>, FetchError>> + Send + '_>> {
        Box::pin(self.fetch())
    }
}

/// Drop readings whose device id is outside the allow-list.
fn filter_allowed(mut readings: Vec<Reading>, allowed: &HashSet<String>) -> Vec<Reading> {
    if allowed.is_empty() {
        return readings;
    }

    let before = readings.len();
    readings.retain(|r| allowed.contains(&r.device_id));
    if readings.len() < before {
        tracing::debug!(
            "Fetch: dropped {} readings outside the device allow-list",
            before - readings.len()
        );
    }

    readings
}

fn coerce_reading(raw: &RawReading) -> Reading {
    let device_id = match &raw.dev_eui {
        Some(id) => id.trim().to_string(),
        None => {
            tracing::warn!("Fetch: reading without a device id");
            String::new()
        }
    };
    let device_name = match &raw.device_name {
        Some(name) => name.clone(),
        None => device_id.clone(),
    };

    Reading {
        temperature: coerce_required_f64(raw.temperature.as_ref(), &device_id, "temperature"),
        humidity: coerce_required_f64(raw.humidity.as_ref(), &device_id, "humidity"),
        timestamp: parse_timestamp(raw.timestamp.as_ref(), &device_id),
        signal_strength: coerce_optional_f64(raw.rssi.as_ref()),
        signal_to_noise: coerce_optional_f64(raw.snr.as_ref()),
        battery_level: coerce_optional_f64(raw.battery_level.as_ref()),
        location: parse_location(raw.location.as_ref()),
        device_id,
        device_name,
    }
}

/// Coerce a numeric wire value, falling back to 0 for anything malformed.
fn coerce_required_f64(value: Option<&Value>, device: &str, field: &str) -> f64 {
    match value {
        None | Some(Value::Null) => 0.0,
        Some(v) => parse_f64(v).unwrap_or_else(|| {
            tracing::warn!("Fetch: device {} has malformed {}, using 0", device, field);
            0.0
        }),
    }
}

fn coerce_optional_f64(value: Option<&Value>) -> Option<f64> {
    value.and_then(parse_f64)
}

/// Accept a JSON number or a numeric string.
fn parse_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse an upstream timestamp; missing or unparsable values become `None`
/// and read as never seen.
fn parse_timestamp(value: Option<&Value>, device: &str) -> Option<DateTime<Utc>> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => {
            let parsed = parse_time_str(s);
            if parsed.is_none() {
                tracing::warn!("Fetch: device {} has unparsable timestamp {:?}", device, s);
            }
            parsed
        }
        Some(Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Some(_) => {
            tracing::warn!("Fetch: device {} has unparsable timestamp", device);
            None
        }
    }
}

fn parse_time_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // Naive fallbacks seen from older exporters
    let formats = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    None
}

fn parse_location(value: Option<&Value>) -> Option<GeoPoint> {
    let value = value?;
    let latitude = parse_f64(value.get("latitude")?)?;
    let longitude = parse_f64(value.get("longitude")?)?;

    Some(GeoPoint {
        latitude,
        longitude,
    })
}
