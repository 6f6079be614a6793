//! Projection Service
//!
//! Loads a league snapshot, projects every entity for the target period and
//! writes the lineup report as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::info;

use projection_service::config::save_config;
use projection_service::{
    initialize_logging_with_config, load_configuration, load_reference, run, Cli, Commands,
    LeagueSnapshot, ProjectionReport,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_configuration(cli.config.as_deref())?;
    initialize_logging_with_config(&config.logging.level, &config.logging.format)?;
    info!("Starting Projection Service v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run { snapshot, reference, output } => {
            let reference = load_reference(&config, reference.as_deref())?;
            let snapshot = LeagueSnapshot::load_from_file(&snapshot)?;
            let report = run(&config, reference, snapshot)?;
            write_report(&report, config.service.pretty_output, output.as_deref())?;
        }
        Commands::InitConfig { path } => {
            save_config(&config, &path)?;
            info!("Configuration written to {:?}", path);
        }
    }
    Ok(())
}

fn write_report(report: &ProjectionReport, pretty: bool, output: Option<&Path>) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    }
    .context("Failed to serialize report")?;

    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write report: {:?}", path))?;
            info!("Report written to {:?}", path);
        }
        None => println!("{json}"),
    }
    Ok(())
}
