//! # Command Line Interface
//!
//! Batch entry points for the projection service.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Projection service CLI
#[derive(Debug, Parser)]
#[command(name = "projection-service")]
#[command(about = "Convert roster projections and recommend a lineup")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Project a league snapshot and optimize the lineup
    Run {
        /// League snapshot JSON
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Reference data JSON; overrides the configured file
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write the effective configuration as TOML
    InitConfig {
        /// Destination file
        path: PathBuf,
    },
}
