use crate::alerts::{evaluate, Alert, AlertSettings};
use crate::errors::{Error, Result};
use crate::metrics::{ALERTS_TOTAL, INVALID_READINGS_TOTAL, KNOWN_DEVICES, READINGS_TOTAL};
use crate::model::{DeviceDetail, DeviceState, Reading};
use crate::validate::parse_reading;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug)]
struct StoredReading {
    reading: Reading,
    received_at: DateTime<Utc>,
}

/// Current state, full history and raised alerts of one device.
///
/// All live behind the same lock so a reader never sees a state that
/// does not match the newest history entry.
#[derive(Debug)]
struct DeviceEntry {
    state: DeviceState,
    history: Vec<StoredReading>,
    alerts: Vec<Alert>,
}

impl DeviceEntry {
    fn first(reading: Reading, received_at: DateTime<Utc>, alerts: Vec<Alert>) -> Self {
        Self {
            state: DeviceState::from_reading(&reading),
            history: vec![StoredReading {
                reading,
                received_at,
            }],
            alerts,
        }
    }

    fn apply(&mut self, reading: Reading, received_at: DateTime<Utc>, alerts: Vec<Alert>) {
        self.state = DeviceState::from_reading(&reading);
        self.history.push(StoredReading {
            reading,
            received_at,
        });
        self.alerts.extend(alerts);
    }
}

type SharedEntry = Arc<Mutex<DeviceEntry>>;

#[derive(Debug, Default)]
struct Index {
    by_id: HashMap<String, SharedEntry>,
    /// Entries in order of first ingest.
    order: Vec<SharedEntry>,
}

/// In-memory device state, analytics history and alerting.
///
/// The index lock is held only long enough to look up or register a
/// device; all reads and writes of a device's data happen under that
/// device's own mutex, so ingests for different devices do not contend.
/// Alert settings are kept apart from the index since they may be set
/// for a device before its first reading.
#[derive(Debug, Clone, Default)]
pub struct DeviceStore {
    index: Arc<RwLock<Index>>,
    alert_settings: Arc<RwLock<HashMap<String, AlertSettings>>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a reading received now.
    pub async fn ingest(&self, reading: Reading) -> Result<()> {
        self.ingest_at(reading, Utc::now()).await
    }

    /// Records a reading: overwrites the device state, appends the reading
    /// to the device's history and records any alerts it raises.
    pub async fn ingest_at(&self, reading: Reading, received_at: DateTime<Utc>) -> Result<()> {
        let alerts = self.check_alerts(&reading, received_at).await;
        let existing = self.index.read().await.by_id.get(&reading.device_id).cloned();

        let entry = match existing {
            Some(entry) => entry,
            None => {
                let mut index = self.index.write().await;
                // Another caller may have registered it between the two locks.
                if let Some(entry) = index.by_id.get(&reading.device_id).cloned() {
                    entry
                } else {
                    let device_id = reading.device_id.clone();
                    let entry = Arc::new(Mutex::new(DeviceEntry::first(
                        reading,
                        received_at,
                        alerts,
                    )));
                    index.by_id.insert(device_id.clone(), entry.clone());
                    index.order.push(entry);
                    KNOWN_DEVICES.set(index.order.len() as f64);
                    debug!("Registered new device {}", device_id);
                    return Ok(());
                }
            }
        };

        entry.lock().await.apply(reading, received_at, alerts);
        Ok(())
    }

    async fn check_alerts(&self, reading: &Reading, at: DateTime<Utc>) -> Vec<Alert> {
        let settings = match self.alert_settings.read().await.get(&reading.device_id) {
            Some(settings) => settings.clone(),
            None => return Vec::new(),
        };

        let alerts = evaluate(&settings, reading, at);
        for alert in &alerts {
            ALERTS_TOTAL.inc();
            warn!(
                device_id = %alert.device_id,
                value = %alert.value,
                threshold = %alert.threshold,
                "{}",
                alert.message
            );
        }
        alerts
    }

    /// Validates a raw JSON payload and ingests it. Nothing is stored when
    /// validation fails.
    pub async fn ingest_payload(&self, payload: &[u8]) -> Result<()> {
        let reading = match parse_reading(payload) {
            Ok(reading) => reading,
            Err(e) => {
                INVALID_READINGS_TOTAL.inc();
                warn!("Rejected reading: {}", e);
                return Err(e);
            }
        };

        self.ingest(reading).await?;
        READINGS_TOTAL.inc();
        Ok(())
    }

    async fn entry(&self, device_id: &str) -> Result<SharedEntry> {
        self.index
            .read()
            .await
            .by_id
            .get(device_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(device_id.to_string()))
    }

    /// Returns the current state and history (oldest first) of a device.
    pub async fn get_device(&self, device_id: &str) -> Result<DeviceDetail> {
        let entry = self.entry(device_id).await?;
        let entry = entry.lock().await;

        Ok(DeviceDetail {
            device: entry.state.clone(),
            analytics: entry.history.iter().map(|s| s.reading.clone()).collect(),
        })
    }

    /// Readings received at or after `since`, oldest first.
    pub async fn readings_since(&self, device_id: &str, since: DateTime<Utc>) -> Result<Vec<Reading>> {
        let entry = self.entry(device_id).await?;
        let entry = entry.lock().await;

        Ok(entry
            .history
            .iter()
            .filter(|s| s.received_at >= since)
            .map(|s| s.reading.clone())
            .collect())
    }

    /// Alerts raised at or after `since`, newest first.
    pub async fn alert_history(&self, device_id: &str, since: DateTime<Utc>) -> Result<Vec<Alert>> {
        let entry = self.entry(device_id).await?;
        let entry = entry.lock().await;

        Ok(entry
            .alerts
            .iter()
            .rev()
            .filter(|a| a.sent_at >= since)
            .cloned()
            .collect())
    }

    /// Returns the state of every known device, in order of first ingest.
    pub async fn list_devices(&self) -> Vec<DeviceState> {
        let entries = self.index.read().await.order.clone();

        let mut devices = Vec::with_capacity(entries.len());
        for entry in entries {
            devices.push(entry.lock().await.state.clone());
        }
        devices
    }

    /// Accepts device preferences. Nothing is stored yet and the device
    /// does not need to exist.
    pub async fn set_preferences(&self, device_id: &str, preferences: Value) {
        debug!(
            "Discarding preferences for device {}: {}",
            device_id, preferences
        );
    }

    /// Alert settings for a device, or the defaults if none were saved.
    pub async fn alert_settings(&self, device_id: &str) -> AlertSettings {
        self.alert_settings
            .read()
            .await
            .get(device_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Replaces a device's alert settings. Applies to readings ingested
    /// from now on; the device does not need to exist yet.
    pub async fn set_alert_settings(
        &self,
        device_id: &str,
        settings: AlertSettings,
    ) -> Result<AlertSettings> {
        settings.validate()?;

        self.alert_settings
            .write()
            .await
            .insert(device_id.to_string(), settings.clone());
        info!("Updated alert settings for device {}", device_id);
        Ok(settings)
    }

    pub async fn device_count(&self) -> usize {
        self.index.read().await.order.len()
    }
}
