use crate::errors::Result;
use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref READINGS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "device_store_readings_total",
        "Total readings accepted into the store"
    ))
    .expect("valid metric options");
    pub static ref INVALID_READINGS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "device_store_invalid_readings_total",
        "Total readings rejected by validation"
    ))
    .expect("valid metric options");
    pub static ref DEVICE_MISSES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "device_store_device_misses_total",
        "Total lookups of devices that were never ingested"
    ))
    .expect("valid metric options");
    pub static ref ALERTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "device_store_alerts_total",
        "Total out-of-range alerts raised by ingested readings"
    ))
    .expect("valid metric options");
    pub static ref MQTT_MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "device_store_mqtt_messages_total",
        "Total messages received from MQTT"
    ))
    .expect("valid metric options");
    pub static ref KNOWN_DEVICES: Gauge = Gauge::with_opts(Opts::new(
        "device_store_known_devices",
        "Number of devices with at least one reading"
    ))
    .expect("valid metric options");
}

pub fn init_metrics() -> Result<()> {
    REGISTRY.register(Box::new(READINGS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INVALID_READINGS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEVICE_MISSES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ALERTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MQTT_MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(KNOWN_DEVICES.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        crate::errors::Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}
