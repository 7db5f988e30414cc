use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Readings at or above this temperature mark a device as `Bad`.
pub const STATUS_TEMPERATURE_LIMIT: f64 = 50.0;

pub const DEFAULT_DEVICE_NAME: &str = "Unknown Device";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Good,
    Bad,
}

impl DeviceStatus {
    pub fn from_temperature(temperature: f64) -> Self {
        if temperature < STATUS_TEMPERATURE_LIMIT {
            DeviceStatus::Good
        } else {
            DeviceStatus::Bad
        }
    }
}

/// Numeric value of a measurement. Validation only admits numbers that
/// have an `f64` form, so the NaN fallback is never observed.
pub fn measurement(value: &Number) -> f64 {
    value.as_f64().unwrap_or(f64::NAN)
}

/// One telemetry event as submitted by a device.
///
/// Measurements keep their JSON number form and fields the store does not
/// interpret are kept in `extra`, so the analytics history returns the
/// reading exactly as it was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub temperature: Number,
    pub humidity: Number,
    pub flow_rate: Number,
    pub timestamp: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Reading {
    pub fn status(&self) -> DeviceStatus {
        DeviceStatus::from_temperature(measurement(&self.temperature))
    }
}

/// Latest known condition of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub id: String,
    pub name: String,
    pub status: DeviceStatus,
    pub temperature: Number,
    pub humidity: Number,
    pub flow_rate: Number,
    pub last_water_flow: String,
}

impl DeviceState {
    /// Builds the full state from a single reading. The name falls back to
    /// the default whenever the reading omits it, even if an earlier reading
    /// carried one.
    pub fn from_reading(reading: &Reading) -> Self {
        Self {
            id: reading.device_id.clone(),
            name: reading
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string()),
            status: reading.status(),
            temperature: reading.temperature.clone(),
            humidity: reading.humidity.clone(),
            flow_rate: reading.flow_rate.clone(),
            last_water_flow: reading.timestamp.clone(),
        }
    }
}

/// REST API response for a single device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDetail {
    pub device: DeviceState,
    pub analytics: Vec<Reading>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
