//! Bricks Helper CLI
//!
//! Entry point for the `bricks-helper` command-line tool.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use bricks_helper::config::{default_config_path, EffectiveConfig, HelperSettings};
use bricks_helper::host::{ClientError, HelperClient, InProcessTransport, StreamTransport, Transport};
use bricks_service::{logging, ServiceConfig};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing::debug;

#[derive(Parser)]
#[command(name = "bricks-helper")]
#[command(about = "Client for the bricks helper service", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: ~/.config/bricks/helper.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Path to the bricks-service executable
    #[arg(long, global = true)]
    service: Option<String>,

    /// Run the service inside this process instead of spawning it
    #[arg(long, global = true)]
    in_process: bool,

    /// Seconds to wait for each reply
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Uppercase a string through the service
    Upper {
        /// Text to transform
        text: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Probe the service for capabilities
    Probe {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    logging::init("info");
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(default_config_path);
    let effective = match EffectiveConfig::build(config_path.as_deref(), cli_overrides(&cli)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    let settings = match effective.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Config => match effective.to_json() {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("Error serializing config: {}", e);
                1
            }
        },
        Commands::Upper { text, json } => run_upper(&settings, cli.in_process, &text, json).await,
        Commands::Probe { json } => run_probe(&settings, cli.in_process, json).await,
    };

    process::exit(code);
}

/// Flags that override config values, as a JSON layer.
fn cli_overrides(cli: &Cli) -> Option<Value> {
    let mut overrides = Map::new();
    if let Some(timeout) = cli.timeout {
        overrides.insert("call_timeout_seconds".to_string(), json!(timeout));
    }
    if let Some(ref path) = cli.service {
        overrides.insert("service".to_string(), json!({ "path": path }));
    }

    if overrides.is_empty() {
        None
    } else {
        Some(Value::Object(overrides))
    }
}

fn connect(settings: &HelperSettings, in_process: bool) -> Result<Arc<dyn Transport>, ClientError> {
    if in_process {
        let config = ServiceConfig::default()
            .with_max_input_bytes(settings.service.max_input_bytes)
            .with_max_in_flight(settings.service.max_in_flight);
        return Ok(Arc::new(InProcessTransport::new(config)));
    }

    let args = vec![
        "serve".to_string(),
        "--max-input-bytes".to_string(),
        settings.service.max_input_bytes.to_string(),
        "--max-in-flight".to_string(),
        settings.service.max_in_flight.to_string(),
    ];
    debug!(path = %settings.service.path, "launching service");
    let transport = StreamTransport::spawn(&settings.service.path, &args, settings.call_timeout())?;
    Ok(Arc::new(transport))
}

async fn run_upper(settings: &HelperSettings, in_process: bool, text: &str, json_output: bool) -> i32 {
    let transport = match connect(settings, in_process) {
        Ok(t) => t,
        Err(e) => return report(&e),
    };
    let mut client = HelperClient::new(transport).with_service_name(settings.service.name.as_str());

    let result = match client.probe().await {
        Ok(_) => client.upper_case_string(text).await,
        Err(e) => Err(e),
    };
    client.invalidate().await;

    match result {
        Ok(reply) => {
            if json_output {
                println!("{}", json!({ "string": reply }));
            } else {
                println!("{}", reply);
            }
            0
        }
        Err(e) => report(&e),
    }
}

async fn run_probe(settings: &HelperSettings, in_process: bool, json_output: bool) -> i32 {
    let transport = match connect(settings, in_process) {
        Ok(t) => t,
        Err(e) => return report(&e),
    };
    let mut client = HelperClient::new(transport).with_service_name(settings.service.name.as_str());

    let result = client.probe().await;
    let negotiated = client.negotiated_version();
    client.invalidate().await;

    let probe = match result {
        Ok(probe) => probe,
        Err(e) => return report(&e),
    };

    if json_output {
        match serde_json::to_string_pretty(&probe) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing probe response: {}", e);
                return 1;
            }
        }
    } else {
        println!("Service:    {} {}", probe.service_name, probe.service_version);
        println!("Protocol:   [{}, {}]", probe.protocol_min, probe.protocol_max);
        if let Some(version) = negotiated {
            println!("Negotiated: {}", version);
        }
        println!("Features:   {}", probe.features.join(", "));
        println!(
            "Limits:     max_input_bytes={} max_in_flight={}",
            probe.limits.max_input_bytes, probe.limits.max_in_flight
        );
    }
    0
}

fn report(error: &ClientError) -> i32 {
    eprintln!("Error: {}", error);
    error.exit_code()
}
