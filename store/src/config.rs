use std::env;

pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_MQTT_TOPIC: &str = "telemetry/#";
pub const DEFAULT_MQTT_CLIENT_ID: &str = "device-store";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub http_addr: String,
    /// MQTT ingest is disabled when no broker is configured.
    pub mqtt_broker: Option<String>,
    pub mqtt_port: u16,
    pub mqtt_topic: String,
    /// Kept stable across restarts so the broker resumes the session.
    pub mqtt_client_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            mqtt_broker: None,
            mqtt_port: DEFAULT_MQTT_PORT,
            mqtt_topic: DEFAULT_MQTT_TOPIC.to_string(),
            mqtt_client_id: DEFAULT_MQTT_CLIENT_ID.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            http_addr: read("HTTP_ADDR").unwrap_or(defaults.http_addr),
            mqtt_broker: read("MQTT_BROKER"),
            mqtt_port: read("MQTT_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.mqtt_port),
            mqtt_topic: read("MQTT_TOPIC").unwrap_or(defaults.mqtt_topic),
            mqtt_client_id: read("MQTT_CLIENT_ID").unwrap_or(defaults.mqtt_client_id),
        }
    }
}
