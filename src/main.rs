use clap::Parser;
use log::{error, info};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use zigbee_capability_bridge::config::{Config, load_dotenv};
use zigbee_capability_bridge::devices::DefinitionRegistry;
use zigbee_capability_bridge::transport::mqtt::CoordinatorBridge;

/// Configures Zigbee devices announced by a coordinator bridge over MQTT and
/// translates their messages.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// MQTT broker host
    #[arg(long, env = "MQTT_BROKER_HOST")]
    broker_host: Option<String>,

    /// MQTT broker port
    #[arg(long, env = "MQTT_BROKER_PORT")]
    broker_port: Option<u16>,

    /// Topic prefix of the coordinator bridge
    #[arg(long, env = "MQTT_BASE_TOPIC")]
    base_topic: Option<String>,

    /// Per-command timeout in milliseconds, 0 disables it
    #[arg(long, env = "CONFIGURE_COMMAND_TIMEOUT_MS")]
    command_timeout_ms: Option<u64>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    load_dotenv();
    init_logger();
    info!("Starting Zigbee capability bridge");

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(host) = args.broker_host {
        config.mqtt.broker_host = host;
    }
    if let Some(port) = args.broker_port {
        config.mqtt.broker_port = port;
    }
    if let Some(base_topic) = args.base_topic {
        config.mqtt.base_topic = base_topic;
    }
    if let Some(timeout) = args.command_timeout_ms {
        config.configure.command_timeout_ms = timeout;
    }

    info!("Configuration loaded:");
    info!("  Broker: {}:{}", config.mqtt.broker_host, config.mqtt.broker_port);
    info!("  Base topic: {}", config.mqtt.base_topic);
    info!("  Command timeout: {} ms", config.configure.command_timeout_ms);
    info!("  Coordinator endpoint: {}", config.configure.coordinator_endpoint);

    let registry = Arc::new(DefinitionRegistry::builtin());
    for (model, e) in registry.errors() {
        error!("Definition {} unavailable: {}", model, e);
    }

    let shutdown = CancellationToken::new();
    let bridge = CoordinatorBridge::new(config, registry);
    let mut bridge_task = tokio::spawn(bridge.run(shutdown.clone()));

    info!("Press Ctrl+C to exit");

    tokio::select! {
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
            shutdown.cancel();
            match (&mut bridge_task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Bridge stopped with error: {}", e),
                Err(e) => error!("Bridge task failed: {}", e),
            }
        }
        result = &mut bridge_task => {
            match result {
                Ok(Ok(())) => info!("Bridge stopped"),
                Ok(Err(e)) => error!("Bridge stopped with error: {}", e),
                Err(e) => error!("Bridge task failed: {}", e),
            }
        }
    }

    info!("Shutdown complete");
}
