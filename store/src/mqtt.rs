use crate::errors::{Error, Result};
use crate::metrics::MQTT_MESSAGES_TOTAL;
use crate::store::DeviceStore;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{debug, error, info};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Subscribes to device telemetry on the broker and feeds every payload
/// into the store. Only returns if the subscription cannot be queued.
pub async fn run_mqtt(
    broker: String,
    port: u16,
    topic: String,
    client_id: String,
    store: DeviceStore,
) -> Result<()> {
    info!("Connecting to MQTT broker at {}:{}", broker, port);

    let mut mqtt_options = MqttOptions::new(client_id, broker, port);
    mqtt_options.set_keep_alive(KEEP_ALIVE);
    // Persistent session: needs the stable client id from config so queued
    // QoS 1 readings are delivered after a restart.
    mqtt_options.set_clean_session(false);

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 10000);

    client
        .subscribe(topic.as_str(), QoS::AtLeastOnce)
        .await
        .map_err(Error::Mqtt)?;

    info!("Subscribed to {} with QoS 1", topic);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                MQTT_MESSAGES_TOTAL.inc();

                debug!(
                    "Received message on topic {}, size: {} bytes",
                    publish.topic,
                    publish.payload.len()
                );

                process_message(&publish.payload, &store).await;
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT error: {}", e);
                // rumqttc reconnects on the next poll
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Ingests a single message. Bad payloads are dropped so one faulty
/// device cannot stall the subscription.
async fn process_message(payload: &[u8], store: &DeviceStore) -> bool {
    match store.ingest_payload(payload).await {
        Ok(()) => true,
        Err(e) => {
            debug!("Dropping MQTT message: {}", e);
            false
        }
    }
}
