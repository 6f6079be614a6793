use player_registry::{EntityId, Role};
use serde::{Deserialize, Serialize};

/// Data-quality tier shared by converter labels and calibration passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    None,
    Low,
    Medium,
    High,
}

/// A point estimate with a 0-100 confidence score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub points: f64,
    pub confidence: f64,
}

impl Estimate {
    pub fn new(points: f64, confidence: f64) -> Self {
        Self { points, confidence }
    }
}

/// Where an archetype ratio came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchetypeSource {
    /// Display name matched a named archetype
    ArchetypeMapping,
    /// Known role, no archetype match
    PositionDefault,
    /// Role absent from the reference tables
    PositionFallback,
}

/// Where the base conversion ratio came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioOrigin {
    Archetype(ArchetypeSource),
    CalibratedEntity,
    CalibratedRole,
}

/// Why a factor ended up at the value it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorStatus {
    Applied,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioFactor {
    pub value: f64,
    pub origin: RatioOrigin,
    /// Archetype name when the ratio came from a named archetype
    pub archetype: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormFactor {
    pub multiplier: f64,
    pub recent_average: Option<f64>,
    pub season_average: f64,
    pub periods_used: usize,
    pub status: FactorStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureFactor {
    pub multiplier: f64,
    pub upcoming_average: Option<f64>,
    pub season_average: f64,
    pub periods_used: usize,
    pub status: FactorStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum InjuryState {
    Available,
    Injured,
    Recovering { periods_since_low_minutes: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuryFactor {
    pub multiplier: f64,
    pub state: InjuryState,
    pub injury_signal: bool,
    pub return_signal: bool,
    pub low_minute_periods: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinutesSource {
    TargetPeriod,
    SeasonMean,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayingTimeFactor {
    pub multiplier: f64,
    pub resolved_minutes: f64,
    pub source: MinutesSource,
}

/// Every multiplier applied by the converter with its evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorBreakdown {
    pub ratio: RatioFactor,
    pub form: FormFactor,
    pub fixture: FixtureFactor,
    pub injury: InjuryFactor,
    pub playing_time: PlayingTimeFactor,
    /// Product of all five multipliers
    pub combined: f64,
}

/// Source-system figures the conversion started from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub season_total: f64,
    pub season_average: f64,
    pub target_period_points: Option<f64>,
    pub periods_with_data: usize,
}

/// Calibrated target-system projection for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertedProjection {
    pub entity_id: EntityId,
    pub role: Role,
    pub target_period: u32,
    pub source: SourceSummary,
    pub season_total: f64,
    pub season_average: f64,
    /// `None` when the source series has no points for the target period
    pub target_period_points: Option<f64>,
    pub confidence: ConfidenceTier,
    pub factors: FactorBreakdown,
}
