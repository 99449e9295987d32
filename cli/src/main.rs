//! Pare CLI - Entry Point
//!
//! Deploys Python functions as versioned serverless functions.
//!
//! - `pare deploy <files..> [-e KEY=VALUE].. [--manifest pare.json]`
//! - `pare status`
//! - `pare delete <service> [--git-hash HASH] [--force]`
//! - `pare invoke <service> [--data JSON]`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pare_cli::commands::{self, DeleteArgs, DeployArgs, InvokeArgs};
use pare_cli::console;
use pare_cli::settings::CliSettings;

/// Deploy python functions with a single command
#[derive(Parser)]
#[command(name = "pare")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "PARE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bundle and deploy the registered services
    Deploy(DeployArgs),

    /// List deployed services
    Status,

    /// Delete a deployed service
    Delete(DeleteArgs),

    /// Invoke a deployed service
    Invoke(InvokeArgs),
}

#[tokio::main]
async fn main() {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("Failed to initialize logging: {e:#}");
    }

    if let Err(e) = run(cli.command).await {
        console::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<()> {
    let settings = CliSettings::load().await?;
    match command {
        Commands::Deploy(args) => commands::deploy::execute(args, &settings).await,
        Commands::Status => commands::status::execute(&settings).await,
        Commands::Delete(args) => commands::delete::execute(args, &settings).await,
        Commands::Invoke(args) => commands::invoke::execute(args, &settings).await,
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))
}
