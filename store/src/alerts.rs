use crate::errors::{Error, Result};
use crate::model::{measurement, Reading};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Per-device alert configuration. Fields missing from an update take
/// their default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub alerts_enabled: bool,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub humidity_min: f64,
    pub humidity_max: f64,
    pub flow_rate_min: f64,
    pub flow_rate_max: f64,
    pub temperature_alert_enabled: bool,
    pub humidity_alert_enabled: bool,
    pub flow_rate_alert_enabled: bool,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            alerts_enabled: false,
            temperature_min: 20.0,
            temperature_max: 25.0,
            humidity_min: 45.0,
            humidity_max: 55.0,
            flow_rate_min: 1.5,
            flow_rate_max: 3.0,
            temperature_alert_enabled: false,
            humidity_alert_enabled: false,
            flow_rate_alert_enabled: false,
        }
    }
}

impl AlertSettings {
    pub fn validate(&self) -> Result<()> {
        let ranges = [
            (AlertKind::Temperature, self.temperature_min, self.temperature_max),
            (AlertKind::Humidity, self.humidity_min, self.humidity_max),
            (AlertKind::FlowRate, self.flow_rate_min, self.flow_rate_max),
        ];

        for (kind, min, max) in ranges {
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(Error::Validation(format!(
                    "{} range {}-{} is invalid",
                    kind.label(),
                    min,
                    max
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Temperature,
    Humidity,
    FlowRate,
}

impl AlertKind {
    fn label(self) -> &'static str {
        match self {
            AlertKind::Temperature => "Temperature",
            AlertKind::Humidity => "Humidity",
            AlertKind::FlowRate => "Flow rate",
        }
    }
}

/// A measurement that left its normal range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub device_id: String,
    pub alert_type: AlertKind,
    pub message: String,
    pub value: Number,
    pub threshold: String,
    pub sent_at: DateTime<Utc>,
}

/// Checks a reading against the device's settings. Nothing fires unless
/// alerts are enabled for the device and for the individual measurement.
pub fn evaluate(settings: &AlertSettings, reading: &Reading, at: DateTime<Utc>) -> Vec<Alert> {
    if !settings.alerts_enabled {
        return Vec::new();
    }

    let checks = [
        (
            AlertKind::Temperature,
            settings.temperature_alert_enabled,
            &reading.temperature,
            settings.temperature_min,
            settings.temperature_max,
        ),
        (
            AlertKind::Humidity,
            settings.humidity_alert_enabled,
            &reading.humidity,
            settings.humidity_min,
            settings.humidity_max,
        ),
        (
            AlertKind::FlowRate,
            settings.flow_rate_alert_enabled,
            &reading.flow_rate,
            settings.flow_rate_min,
            settings.flow_rate_max,
        ),
    ];

    checks
        .into_iter()
        .filter(|(_, enabled, value, min, max)| {
            let value = measurement(value);
            *enabled && (value < *min || value > *max)
        })
        .map(|(kind, _, value, min, max)| Alert {
            device_id: reading.device_id.clone(),
            alert_type: kind,
            message: format!("{} out of range", kind.label()),
            value: value.clone(),
            threshold: format!("{}-{}", min, max),
            sent_at: at,
        })
        .collect()
}
