use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Share of readings generated above the `Bad` threshold.
const HOT_READING_RATIO: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: String,
    pub name: String,
    pub temperature: f64,
    pub humidity: f64,
    pub flow_rate: f64,
    pub timestamp: String,
}

impl Reading {
    pub fn random(rng: &mut impl Rng, device_index: u64) -> Self {
        let temperature = if rng.gen_bool(HOT_READING_RATIO) {
            rng.gen_range(50.0..80.0)
        } else {
            rng.gen_range(15.0..45.0)
        };

        Self {
            device_id: format!("dev-{}", device_index),
            name: format!("Sensor {}", device_index),
            temperature,
            humidity: rng.gen_range(30.0..80.0),
            flow_rate: rng.gen_range(0.5..5.0),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn topic(&self) -> String {
        format!("telemetry/{}", self.device_id)
    }
}
