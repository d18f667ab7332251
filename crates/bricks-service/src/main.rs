//! Bricks Service Entrypoint
//!
//! Usage: bricks-service <rpc|serve> [--max-input-bytes N] [--max-in-flight N]
//!
//! `rpc` answers one JSON request from stdin; `serve` answers requests until
//! stdin closes. Responses go to stdout, logs to stderr.

use std::process::ExitCode;

use bricks_service::{logging, RpcHandler, ServiceConfig};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::error;

#[derive(Parser)]
#[command(name = "bricks-service")]
#[command(about = "Bricks helper service", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Largest accepted input string, in bytes
    #[arg(long, global = true)]
    max_input_bytes: Option<u64>,

    /// Requests handled concurrently before answering BUSY
    #[arg(long, global = true)]
    max_in_flight: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single request from stdin
    Rpc,
    /// Answer requests from stdin until it closes
    Serve,
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init("warn");
    let cli = Cli::parse();

    let mut config = ServiceConfig::default();
    if let Some(max) = cli.max_input_bytes {
        config = config.with_max_input_bytes(max);
    }
    if let Some(max) = cli.max_in_flight {
        config = config.with_max_in_flight(max);
    }

    let handler = RpcHandler::new(config);
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut writer = tokio::io::stdout();

    let result = match cli.command {
        Commands::Rpc => handler.run_once(&mut reader, &mut writer).await,
        Commands::Serve => handler.serve(reader, &mut writer).await,
    };

    if let Err(e) = result {
        error!(error = %e, "RPC handler error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
