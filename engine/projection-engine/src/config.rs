use crate::error::{ProjectionError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the projection engine
///
/// Every clamp band and threshold used by the converter, the calibration
/// pass, the correction model and the consensus step lives here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Score conversion pipeline parameters
    pub converter: ConverterConfig,

    /// Empirical ratio calibration parameters
    pub calibration: CalibrationConfig,

    /// Statistical / ML reconciliation parameters
    pub consensus: ConsensusConfig,

    /// Bias-correction model parameters
    pub correction: CorrectionConfig,
}

/// A playing-time band: expected minutes at or above `min_minutes` get `multiplier`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MinutesBand {
    pub min_minutes: f64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConverterConfig {
    /// Completed periods averaged for form momentum
    pub form_window: usize,

    /// Minimum completed periods before form is applied
    pub form_min_periods: usize,

    pub form_floor: f64,
    pub form_ceiling: f64,

    /// Upcoming periods (target inclusive) averaged for fixture-run quality
    pub fixture_window: usize,

    /// Minimum upcoming periods before the fixture factor is applied
    pub fixture_min_periods: usize,

    /// Secondary correction band on top of fixture-aware source projections
    pub fixture_floor: f64,
    pub fixture_ceiling: f64,

    /// Multiplier for an entity flagged injured with no return signal
    pub injured_multiplier: f64,

    /// Recovery multipliers indexed by periods since the last low-minute period
    pub recovery_multipliers: Vec<f64>,

    /// Completed periods inspected for low-minute appearances
    pub recovery_lookback: usize,

    /// Below this many minutes a period counts as a low-minute period
    pub low_minutes_threshold: f64,

    /// Substrings (matched at word starts) flagging injury or suspension
    pub injury_keywords: Vec<String>,

    /// Substrings (matched at word starts) signalling a return to availability
    pub return_keywords: Vec<String>,

    /// Phrases removed from the news before the return scan ("unknown return date")
    pub negated_return_keywords: Vec<String>,

    /// Minutes assumed when the feed has no minutes data at all
    pub default_minutes: f64,

    /// Multiplier applied when no minutes data exists
    pub no_minutes_multiplier: f64,

    /// Bands checked from the highest `min_minutes` down
    pub minutes_bands: Vec<MinutesBand>,

    /// Periods of source data needed for a `high` label
    pub high_confidence_periods: usize,

    /// Periods of source data needed for a `medium` label
    pub medium_confidence_periods: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            form_window: 3,
            form_min_periods: 2,
            form_floor: 0.80,
            form_ceiling: 1.20,
            fixture_window: 6,
            fixture_min_periods: 3,
            fixture_floor: 0.92,
            fixture_ceiling: 1.08,
            injured_multiplier: 0.5,
            recovery_multipliers: vec![0.70, 0.85, 0.95, 1.00],
            recovery_lookback: 3,
            low_minutes_threshold: 30.0,
            injury_keywords: [
                "injur", "knock", "strain", "suspend", "ruled out", "illness", "hamstring",
                "ankle", "knee", "groin", "calf", "surgery", "fracture", "concussion",
                "unavailable",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            return_keywords: [
                "returned", "returns to training", "return to training", "back in training",
                "back in full training", "expected back", "available again", "fit again",
                "recovered", "resumed training",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            negated_return_keywords: [
                "unknown return", "no return date", "return date unknown", "no timeframe",
                "not expected back", "no expected return",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            default_minutes: 90.0,
            no_minutes_multiplier: 0.70,
            minutes_bands: vec![
                MinutesBand { min_minutes: 75.0, multiplier: 1.00 },
                MinutesBand { min_minutes: 60.0, multiplier: 0.90 },
                MinutesBand { min_minutes: 30.0, multiplier: 0.75 },
                MinutesBand { min_minutes: 0.0, multiplier: 0.40 },
            ],
            high_confidence_periods: 15,
            medium_confidence_periods: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Total surviving pairs required before anything but the static fallback
    pub min_total_samples: usize,

    /// Pairs a role needs before its trimmed mean replaces the static ratio
    pub min_role_samples: usize,

    /// Pairs an entity needs before it gets its own ratio
    pub min_entity_samples: usize,

    /// Sample count at which an entity's own mean gets full weight
    pub entity_full_weight_samples: f64,

    /// Plausible target/source ratio band; pairs outside are dropped
    pub ratio_floor: f64,
    pub ratio_ceiling: f64,

    /// Fraction trimmed from each end before averaging a role bucket
    pub trim_fraction: f64,

    pub high_confidence_samples: usize,
    pub medium_confidence_samples: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_total_samples: 10,
            min_role_samples: 3,
            min_entity_samples: 5,
            entity_full_weight_samples: 15.0,
            ratio_floor: 0.15,
            ratio_ceiling: 6.0,
            trim_fraction: 0.10,
            high_confidence_samples: 50,
            medium_confidence_samples: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Disagreement ratio ceilings for each agreement tier
    pub strong_threshold: f64,
    pub moderate_threshold: f64,
    pub weak_threshold: f64,

    /// Share of the two-estimate average kept for weak agreement (rest is baseline)
    pub weak_average_weight: f64,

    /// Share of the two-estimate average kept on disagreement
    pub disagreement_average_weight: f64,

    /// Confidence adjustments per tier
    pub strong_bonus: f64,
    pub moderate_bonus: f64,
    pub weak_penalty: f64,
    pub disagreement_penalty: f64,

    /// Consensus above `outlier_trigger` x baseline is capped at `outlier_cap` x baseline
    pub outlier_trigger: f64,
    pub outlier_cap: f64,
    pub outlier_penalty: f64,

    /// Numeric confidence attached to converter labels
    pub high_label_score: f64,
    pub medium_label_score: f64,
    pub low_label_score: f64,
    pub none_label_score: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            strong_threshold: 0.10,
            moderate_threshold: 0.20,
            weak_threshold: 0.30,
            weak_average_weight: 0.70,
            disagreement_average_weight: 0.50,
            strong_bonus: 15.0,
            moderate_bonus: 5.0,
            weak_penalty: 5.0,
            disagreement_penalty: 20.0,
            outlier_trigger: 3.0,
            outlier_cap: 2.5,
            outlier_penalty: 15.0,
            high_label_score: 85.0,
            medium_label_score: 70.0,
            low_label_score: 50.0,
            none_label_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Samples a role needs before a correction is fitted for it
    pub min_samples: usize,

    /// L2 penalty on the feature coefficients (intercept is not penalized)
    pub l2: f64,

    pub learning_rate: f64,
    pub iterations: usize,

    /// Clamp band for the predicted multiplier
    pub multiplier_floor: f64,
    pub multiplier_ceiling: f64,

    /// Confidence reported for roles without a fitted model
    pub untrained_confidence: f64,

    /// Confidence range for fitted roles, reached at `full_confidence_samples`
    pub min_confidence: f64,
    pub max_confidence: f64,
    pub full_confidence_samples: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            min_samples: 8,
            l2: 0.1,
            learning_rate: 0.1,
            iterations: 500,
            multiplier_floor: 0.75,
            multiplier_ceiling: 1.25,
            untrained_confidence: 40.0,
            min_confidence: 50.0,
            max_confidence: 80.0,
            full_confidence_samples: 60,
        }
    }
}

impl EngineConfig {
    /// Apply `PROJECTION_*` environment overrides; unparsable values are ignored
    pub fn apply_env_overrides(&mut self) {
        override_from_env("PROJECTION_FORM_WINDOW", &mut self.converter.form_window);
        override_from_env("PROJECTION_FIXTURE_WINDOW", &mut self.converter.fixture_window);
        override_from_env("PROJECTION_INJURED_MULTIPLIER", &mut self.converter.injured_multiplier);
        override_from_env("PROJECTION_DEFAULT_MINUTES", &mut self.converter.default_minutes);
        override_from_env(
            "PROJECTION_CALIBRATION_MIN_SAMPLES",
            &mut self.calibration.min_total_samples,
        );
        override_from_env("PROJECTION_CALIBRATION_TRIM", &mut self.calibration.trim_fraction);
        override_from_env("PROJECTION_CONSENSUS_WEAK", &mut self.consensus.weak_threshold);
        override_from_env("PROJECTION_CORRECTION_L2", &mut self.correction.l2);
        override_from_env("PROJECTION_CORRECTION_ITERATIONS", &mut self.correction.iterations);
    }

    /// Reject configurations whose bands are inverted or empty
    pub fn validate(&self) -> Result<()> {
        let c = &self.converter;
        if c.form_floor > c.form_ceiling || c.fixture_floor > c.fixture_ceiling {
            return Err(invalid("converter clamp floor exceeds ceiling"));
        }
        if c.recovery_multipliers.is_empty() {
            return Err(invalid("converter.recovery_multipliers must not be empty"));
        }
        if c.minutes_bands.is_empty() {
            return Err(invalid("converter.minutes_bands must not be empty"));
        }
        let cal = &self.calibration;
        if cal.ratio_floor <= 0.0 || cal.ratio_floor >= cal.ratio_ceiling {
            return Err(invalid("calibration ratio band is invalid"));
        }
        if !(0.0..0.5).contains(&cal.trim_fraction) {
            return Err(ProjectionError::Configuration(format!(
                "calibration.trim_fraction {} not in [0, 0.5)",
                cal.trim_fraction
            )));
        }
        let con = &self.consensus;
        if !(con.strong_threshold <= con.moderate_threshold
            && con.moderate_threshold <= con.weak_threshold)
        {
            return Err(invalid("consensus thresholds must be ascending"));
        }
        let cor = &self.correction;
        if cor.multiplier_floor > cor.multiplier_ceiling || cor.multiplier_floor <= 0.0 {
            return Err(invalid("correction multiplier band is invalid"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ProjectionError {
    ProjectionError::Configuration(message.to_string())
}

fn override_from_env<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!("Ignoring unparsable value for {}: {:?}", key, raw),
        }
    }
}
