//! Projection Service Library
//!
//! Wires the player registry, the projection engine and the lineup optimizer
//! into a single batch run driven by a league snapshot.

use anyhow::{Context, Result};
use std::path::Path;

pub mod cli;
pub mod config;
pub mod logging;
pub mod runner;
pub mod snapshot;

pub use cli::{Cli, Commands};
pub use config::ServiceConfig;
pub use logging::initialize_logging_with_config;
pub use runner::{load_reference, run, ProjectionReport};
pub use snapshot::LeagueSnapshot;

/// Load configuration from an optional file and environment variables
pub fn load_configuration(path: Option<&Path>) -> Result<ServiceConfig> {
    config::load_config(path).context("Failed to load service configuration")
}
