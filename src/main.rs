//! Lectern CLI entry point.

use anyhow::Result;
use clap::Parser;
use lectern::cli::{commands, Cli, Commands};
use lectern::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // stdout carries MCP traffic; logs go to stderr.
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("lectern={}", log_level)),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match &cli.command {
        Commands::Mcp => {
            commands::run_mcp(&settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings, config_path.as_ref()).await?;
        }

        Commands::Courses => {
            commands::run_courses(&settings).await?;
        }

        Commands::Tools => {
            commands::run_tools()?;
        }

        Commands::Call { tool, arguments } => {
            commands::run_call(&settings, tool, arguments).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, &settings, config_path.as_ref())?;
        }
    }

    Ok(())
}
