//! Offline inspection of the built-in device catalog.
//!
//! Usage:
//!   cargo run --bin zigbee-plan -- list
//!   cargo run --bin zigbee-plan -- describe ZK-EU-2U
//!   cargo run --bin zigbee-plan -- plan ZK-EU-2U --inventory endpoints.json
//!   cargo run --bin zigbee-plan -- plan MS-104BZ --inventory endpoints.json --execute
//!
//! The inventory file is the device's endpoint list as the coordinator
//! reports it: `[{"id": 1, "inputClusters": ["genBasic", "genOnOff"]}, ...]`.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use zigbee_capability_bridge::devices::{DefinitionRegistry, RegisteredDevice};
use zigbee_capability_bridge::endpoint::EndpointInventory;
use zigbee_capability_bridge::error::{BridgeError, ConfigureWarning, Result};
use zigbee_capability_bridge::executor::{ConfigurationExecutor, ConfigureOutcome, Device, ExecutorOptions};
use zigbee_capability_bridge::radio::{DryRunRadio, RadioCommand};

#[derive(Parser)]
#[command(name = "zigbee-plan")]
#[command(about = "Inspect composed device definitions and their configuration plans")]
struct Cli {
    /// Coordinator endpoint binds point at
    #[arg(long, env = "COORDINATOR_ENDPOINT", default_value_t = 1)]
    coordinator_endpoint: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in device models
    List,
    /// Print the composed descriptor of a model
    Describe {
        /// Catalog model name, e.g. ZK-EU-2U
        model: String,
    },
    /// Print the radio commands configuring a model on a given device
    Plan {
        model: String,

        /// JSON file with the device's endpoint inventory
        #[arg(long)]
        inventory: PathBuf,

        /// IEEE address used in the output
        #[arg(long, default_value = "0x0000000000000000")]
        ieee: String,

        /// Run the configuration against a dry-run radio, custom steps included
        #[arg(long)]
        execute: bool,
    },
}

#[derive(Serialize)]
struct PlanReport<'a> {
    model: &'a str,
    commands: Vec<RadioCommand>,
    warnings: Vec<ConfigureWarning>,
}

#[derive(Serialize)]
struct ExecuteReport<'a> {
    model: &'a str,
    sent: Vec<RadioCommand>,
    outcome: ConfigureOutcome,
}

fn find<'a>(registry: &'a DefinitionRegistry, model: &str) -> Result<&'a RegisteredDevice> {
    registry
        .by_model(model)
        .ok_or_else(|| BridgeError::UnknownModel(model.to_string()))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let registry = DefinitionRegistry::builtin();
    for (model, e) in registry.errors() {
        eprintln!("{model}: {e}");
    }

    match cli.command {
        Commands::List => {
            for entry in registry.iter() {
                let definition = &entry.definition;
                println!("{:<12} {:<8} {}", definition.model, definition.vendor, definition.description);
            }
        }
        Commands::Describe { model } => {
            let entry = find(&registry, &model)?;
            print_json(&entry.descriptor.summary())?;
        }
        Commands::Plan {
            model,
            inventory,
            ieee,
            execute,
        } => {
            let entry = find(&registry, &model)?;
            let content = std::fs::read_to_string(&inventory)?;
            let endpoints: EndpointInventory = serde_json::from_str(&content)
                .map_err(|e| BridgeError::InvalidInventory(format!("{}: {}", inventory.display(), e)))?;
            let device = Device::new(ieee, endpoints);

            let radio = Arc::new(DryRunRadio::new());
            let executor = ConfigurationExecutor::new(radio.clone()).with_options(ExecutorOptions {
                coordinator_endpoint: cli.coordinator_endpoint,
                ..ExecutorOptions::default()
            });

            if execute {
                let outcome = executor
                    .execute(&device, &entry.descriptor, &CancellationToken::new())
                    .await;
                print_json(&ExecuteReport {
                    model: &model,
                    sent: radio.sent(),
                    outcome,
                })?;
            } else {
                let (commands, resolution) = executor.plan(&device, &entry.descriptor);
                print_json(&PlanReport {
                    model: &model,
                    commands,
                    warnings: resolution.warnings,
                })?;
            }
        }
    }

    Ok(())
}
