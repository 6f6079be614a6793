//! League snapshot: everything one projection run consumes

use anyhow::{Context, Result};
use lineup_optimizer::CurrentLineup;
use player_registry::RosterSnapshot;
use projection_engine::ActualPoints;
use serde::Deserialize;
use std::path::Path;

/// Roster, projections, historical actuals and the user's current lineup
#[derive(Debug, Clone, Deserialize)]
pub struct LeagueSnapshot {
    /// Period to project; supplied by the caller's schedule
    pub target_period: Option<u32>,

    /// Latest period whose actuals are final; defaults to the one before the target
    #[serde(default)]
    pub last_completed_period: Option<u32>,

    #[serde(flatten)]
    pub roster: RosterSnapshot,

    #[serde(default)]
    pub source_actuals: Vec<ActualPoints>,

    #[serde(default)]
    pub target_actuals: Vec<ActualPoints>,

    #[serde(default)]
    pub current_lineup: Option<CurrentLineup>,
}

impl LeagueSnapshot {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse league snapshot")
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot: {:?}", path))?;
        Self::from_json_str(&json).with_context(|| format!("Invalid snapshot: {:?}", path))
    }

    /// Last period usable for calibration and correction fitting
    pub fn completed_through(&self) -> Option<u32> {
        self.last_completed_period
            .or_else(|| self.target_period.and_then(|t| t.checked_sub(1)))
    }
}
