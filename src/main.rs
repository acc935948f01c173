use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slotcast::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "slotcast",
    version,
    about = "Unattended ad-slot player with drift-corrected scheduling and a bounded image cache",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML); environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play schedules until interrupted
    Run,

    /// Fetch and validate the current schedule once
    Fetch {
        /// Print the normalized schedule as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Show the persisted schedule
    Status,

    /// Remove the persisted schedule
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate().context("Invalid configuration")?;

    // Initialize tracing/logging
    let format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(format, &config.logging.level, cli.verbose)?;

    tracing::info!(screen_id = %config.source.screen_id, "slotcast starting");

    match cli.command {
        Commands::Run => {
            tracing::info!(
                base_url = %config.source.base_url,
                data_dir = %config.storage.data_dir.display(),
                "Starting run command"
            );
            commands::run(&config).await?;
        }

        Commands::Fetch { json } => {
            tracing::info!(json = %json, "Starting fetch command");
            commands::fetch(&config, json).await?;
        }

        Commands::Status => {
            commands::status(&config).await?;
        }

        Commands::Clear => {
            commands::clear(&config).await?;
        }
    }

    tracing::info!("slotcast completed successfully");
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("slotcast=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("slotcast={level},warn"))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
