//! Service configuration management
//!
//! Defaults, then an optional TOML file, then `PROJECTION_*` environment
//! overrides, then validation.

use anyhow::{anyhow, Context, Result};
use lineup_optimizer::OptimizerConfig;
use projection_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Conversion, calibration, correction and consensus parameters
    pub engine: EngineConfig,

    /// Lineup optimizer parameters
    pub optimizer: OptimizerConfig,

    /// Service-level settings
    pub service: ServiceSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Reference data (archetype tables) JSON; built-in tables when unset
    pub reference_file: Option<PathBuf>,

    /// Fit the bias-correction model from target actuals when available
    pub fit_correction: bool,

    /// Pretty-print the JSON report
    pub pretty_output: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self { reference_file: None, fit_correction: true, pretty_output: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Load configuration from an optional file and environment variables
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let mut config = match path {
        Some(path) => load_from_file(path)?,
        None => ServiceConfig::default(),
    };

    load_from_env(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Load configuration from a TOML file; missing keys keep their defaults
pub fn load_from_file(path: &Path) -> Result<ServiceConfig> {
    tracing::debug!("Loading configuration from file: {:?}", path);
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    toml::from_str(&raw).with_context(|| format!("Failed to parse config file: {:?}", path))
}

/// Apply environment overrides
fn load_from_env(config: &mut ServiceConfig) {
    if let Ok(level) = std::env::var("PROJECTION_LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Ok(format) = std::env::var("PROJECTION_LOG_FORMAT") {
        config.logging.format = format;
    }

    if let Ok(reference) = std::env::var("PROJECTION_REFERENCE_FILE") {
        config.service.reference_file = Some(PathBuf::from(reference));
    }

    if let Ok(fit) = std::env::var("PROJECTION_FIT_CORRECTION") {
        config.service.fit_correction = fit.parse().unwrap_or(config.service.fit_correction);
    }

    if let Ok(threshold) = std::env::var("PROJECTION_MATERIALITY_THRESHOLD") {
        match threshold.parse() {
            Ok(value) => config.optimizer.materiality_threshold = value,
            Err(_) => tracing::warn!("Ignoring invalid PROJECTION_MATERIALITY_THRESHOLD: {}", threshold),
        }
    }

    config.engine.apply_env_overrides();
}

/// Validate configuration
pub fn validate_config(config: &ServiceConfig) -> Result<()> {
    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.logging.level)),
    }

    match config.logging.format.as_str() {
        "json" | "pretty" | "compact" => {}
        _ => return Err(anyhow!("Invalid log format: {}", config.logging.format)),
    }

    let threshold = config.optimizer.materiality_threshold;
    if !(threshold.is_finite() && threshold >= 0.0) {
        return Err(anyhow!("Invalid materiality threshold: {}", threshold));
    }

    config.engine.validate().context("Invalid engine configuration")?;

    Ok(())
}

/// Save configuration to a TOML file
pub fn save_config(config: &ServiceConfig, path: &Path) -> Result<()> {
    let raw = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    std::fs::write(path, raw).with_context(|| format!("Failed to write config file: {:?}", path))
}
