use device_store::config::Config;
use device_store::{metrics, mqtt, rest, DeviceStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting device store");
    info!("HTTP server: {}", config.http_addr);

    metrics::init_metrics()?;

    let store = DeviceStore::new();

    let mqtt_handle = match config.mqtt_broker.clone() {
        Some(broker) => {
            info!("MQTT broker: {}:{}", broker, config.mqtt_port);
            let client_id = config.mqtt_client_id.clone();
            let mqtt_store = store.clone();
            let port = config.mqtt_port;
            let topic = config.mqtt_topic.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = mqtt::run_mqtt(broker, port, topic, client_id, mqtt_store).await {
                    error!("MQTT task failed: {}", e);
                }
            }))
        }
        None => {
            info!("MQTT_BROKER not set, MQTT ingest disabled");
            None
        }
    };

    let app = rest::create_router(store.clone());

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .map_err(|e| {
            error!("Failed to bind to {}: {}", config.http_addr, e);
            e
        })?;

    info!("HTTP server listening on {}", config.http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    let mqtt_finished = async move {
        match mqtt_handle {
            Some(handle) => {
                let _ = handle.await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = mqtt_finished => {
            error!("MQTT task terminated");
        }
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down with {} known devices", store.device_count().await);
    Ok(())
}
