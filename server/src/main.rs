//! Pare deploy server - Entry Point
//!
//! Accepts bundles of Python services and deploys each one as a serverless
//! function.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use pare_server::app::options::AppOptions;
use pare_server::app::run::run;
use pare_server::logs::{init_logging, LogOptions};
use pare_server::storage::settings::Settings;
use pare_server::utils::version_info;

#[derive(Debug, Parser)]
#[command(name = "pare-server", version, about = "Pare deploy API server")]
struct Args {
    /// JSON settings file
    #[arg(long, env = "PARE_CONFIG")]
    config: Option<PathBuf>,

    /// Print version information and exit
    #[arg(long)]
    version_info: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let version = version_info();
    if args.version_info {
        println!("{}", serde_json::to_string_pretty(&version)?);
        return Ok(());
    }

    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let mut settings = Settings::load(args.config.as_deref()).await?;
    settings.apply_env_overrides(|key| std::env::var(key).ok());

    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.log_json,
        log_dir: settings.log_dir.clone(),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    info!(
        version = %version.version,
        git_hash = %version.git_hash,
        "Running Pare server"
    );
    let result = run(AppOptions::new(settings), await_shutdown_signal()).await;
    if let Err(e) = &result {
        error!("Server exited with error: {e}");
    }
    Ok(result?)
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
        }
        info!("Ctrl+C received, shutting down...");
    }
}
