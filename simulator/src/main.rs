mod telemetry;

use clap::Parser;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::time::{Duration, Instant};
use telemetry::Reading;
use tracing::{error, info, warn};

const BURST_SIZE: u64 = 200;

#[derive(Debug, Parser)]
#[command(name = "simulator")]
#[command(about = "Publishes simulated device readings over MQTT")]
struct Cli {
    #[arg(long, env = "MQTT_BROKER", default_value = "localhost")]
    mqtt_broker: String,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    mqtt_port: u16,

    /// Messages per second
    #[arg(long, env = "RATE", default_value_t = 1000)]
    rate: u64,

    #[arg(long, env = "DEVICES", default_value_t = 100)]
    devices: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Starting device simulator");
    info!(
        "Broker: {}:{}, Rate: {} msg/s, Devices: {}",
        cli.mqtt_broker, cli.mqtt_port, cli.rate, cli.devices
    );

    let client_id = format!("sim-{}", uuid::Uuid::new_v4());

    let mut mqtt_options = MqttOptions::new(&client_id, &cli.mqtt_broker, cli.mqtt_port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_clean_session(true);

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 20000);

    tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                error!("MQTT eventloop error: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    });

    tokio::time::sleep(Duration::from_secs(2)).await;

    info!("Connected to MQTT broker, starting to publish readings");

    let rate = cli.rate.max(1);
    let devices = cli.devices.max(1);
    let burst_interval = Duration::from_millis((BURST_SIZE * 1000) / rate);
    info!("Publishing in bursts of {} messages every {:?}", BURST_SIZE, burst_interval);

    let mut rng = rand::thread_rng();
    let mut counter = 0u64;

    loop {
        let burst_start = Instant::now();

        for _ in 0..BURST_SIZE {
            let reading = Reading::random(&mut rng, counter % devices);

            let payload = match serde_json::to_string(&reading) {
                Ok(p) => p,
                Err(e) => {
                    error!("Failed to serialize reading: {}", e);
                    continue;
                }
            };

            match client
                .publish(reading.topic(), QoS::AtLeastOnce, false, payload)
                .await
            {
                Ok(_) => counter += 1,
                Err(e) => warn!("Failed to publish: {}", e),
            }
        }

        if counter % 10000 == 0 {
            info!("Published {} messages", counter);
        }

        let elapsed = burst_start.elapsed();
        if elapsed < burst_interval {
            tokio::time::sleep(burst_interval - elapsed).await;
        } else if elapsed > burst_interval * 2 {
            warn!(
                "Burst took {:?}, target was {:?} - system may be overloaded",
                elapsed, burst_interval
            );
        }
    }
}
