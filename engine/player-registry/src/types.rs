use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a roster entity (an athlete)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed role set an entity plays in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "GK", alias = "GKP")]
    Goalkeeper,
    #[serde(rename = "DEF")]
    Defender,
    #[serde(rename = "MID")]
    Midfielder,
    #[serde(rename = "FWD")]
    Forward,
}

impl Role {
    /// All roles in lineup order (keeper first)
    pub const ALL: [Role; 4] = [Role::Goalkeeper, Role::Defender, Role::Midfielder, Role::Forward];

    /// Short code used in reports and shortfall reasons (e.g. "DEF")
    pub fn code(&self) -> &'static str {
        match self {
            Role::Goalkeeper => "GK",
            Role::Defender => "DEF",
            Role::Midfielder => "MID",
            Role::Forward => "FWD",
        }
    }

    /// Parse the loose role labels upstream feeds use ("GKP", "Defender", "F", ...)
    pub fn from_label(label: &str) -> Option<Role> {
        match label.trim().to_ascii_uppercase().as_str() {
            "GK" | "GKP" | "G" | "GOALKEEPER" | "KEEPER" => Some(Role::Goalkeeper),
            "DEF" | "D" | "DEFENDER" => Some(Role::Defender),
            "MID" | "M" | "MIDFIELDER" => Some(Role::Midfielder),
            "FWD" | "F" | "FW" | "FORWARD" | "STRIKER" => Some(Role::Forward),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Who holds the entity in the league
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    #[default]
    Unowned,
    OwnedBySelf,
    OwnedByOther,
}

/// A roster entity as delivered by the ingestion feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier
    pub id: EntityId,

    /// Display name (e.g. "Bukayo Saka")
    pub name: String,

    /// Playing role
    pub role: Role,

    /// Team abbreviation (e.g. "ARS")
    pub team: String,

    /// Ownership state, refreshed per sync
    #[serde(default)]
    pub ownership: Ownership,

    /// Free-text availability status from the feed
    #[serde(default)]
    pub status: Option<String>,

    /// Free-text news line from the feed
    #[serde(default)]
    pub news: Option<String>,
}

impl Entity {
    /// Create a new unowned entity with no availability text
    pub fn new(id: u32, name: impl Into<String>, role: Role, team: impl Into<String>) -> Self {
        Self {
            id: EntityId(id),
            name: name.into(),
            role,
            team: team.into(),
            ownership: Ownership::Unowned,
            status: None,
            news: None,
        }
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_news(mut self, news: impl Into<String>) -> Self {
        self.news = Some(news.into());
        self
    }
}

/// Whether a period row is a forecast or a realized result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    #[default]
    Projection,
    Result,
}

/// Baseline source-system projection for one entity in one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodProjection {
    /// Period (gameweek) index
    pub period: u32,

    /// Predicted source-system points; `None` means no data, not zero
    pub points: Option<f64>,

    /// Predicted playing time in minutes
    pub minutes: Option<f64>,

    /// Opponent descriptor (e.g. "CHE (H)")
    #[serde(default)]
    pub opponent: Option<String>,

    /// Fixture difficulty rating, 1 (easy) to 5 (hard)
    #[serde(default)]
    pub difficulty: Option<u8>,

    #[serde(default)]
    pub provenance: Provenance,
}

impl PeriodProjection {
    pub fn new(period: u32, points: Option<f64>) -> Self {
        Self {
            period,
            points,
            minutes: None,
            opponent: None,
            difficulty: None,
            provenance: Provenance::Projection,
        }
    }

    pub fn with_minutes(mut self, minutes: f64) -> Self {
        self.minutes = Some(minutes);
        self
    }

    pub fn realized(mut self) -> Self {
        self.provenance = Provenance::Result;
        self
    }
}

/// Period-ordered projection sequence for one entity, unique per period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionSeries {
    entity_id: EntityId,
    periods: Vec<PeriodProjection>,
}

impl ProjectionSeries {
    /// Build a series, sorting by period and rejecting duplicated period indices
    pub fn new(
        entity_id: EntityId,
        mut periods: Vec<PeriodProjection>,
    ) -> Result<Self, RegistryError> {
        periods.sort_by_key(|p| p.period);
        if let Some(pair) = periods.windows(2).find(|w| w[0].period == w[1].period) {
            return Err(RegistryError::DuplicatePeriod { entity_id, period: pair[0].period });
        }
        Ok(Self { entity_id, periods })
    }

    /// A series with no periods at all
    pub fn empty(entity_id: EntityId) -> Self {
        Self { entity_id, periods: Vec::new() }
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeriodProjection> {
        self.periods.iter()
    }

    pub fn as_slice(&self) -> &[PeriodProjection] {
        &self.periods
    }

    /// Projection for a specific period, if present
    pub fn get(&self, period: u32) -> Option<&PeriodProjection> {
        self.periods
            .binary_search_by_key(&period, |p| p.period)
            .ok()
            .map(|idx| &self.periods[idx])
    }

    /// Periods strictly before `period`, oldest first
    pub fn before(&self, period: u32) -> &[PeriodProjection] {
        let split = self.periods.partition_point(|p| p.period < period);
        &self.periods[..split]
    }

    /// Periods at or after `period`, earliest first
    pub fn from_period(&self, period: u32) -> &[PeriodProjection] {
        let split = self.periods.partition_point(|p| p.period < period);
        &self.periods[split..]
    }

    /// Known (non-missing, finite) point values in period order
    pub fn known_points(&self) -> impl Iterator<Item = f64> + '_ {
        self.periods.iter().filter_map(|p| p.points.filter(|v| v.is_finite()))
    }

    /// Known minute values in period order
    pub fn known_minutes(&self) -> impl Iterator<Item = f64> + '_ {
        self.periods.iter().filter_map(|p| p.minutes.filter(|v| v.is_finite()))
    }
}

/// Errors raised by the registry and the ingestion boundary
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// Two rows for the same entity share a period index
    DuplicatePeriod { entity_id: EntityId, period: u32 },

    /// Entity not present in the registry
    EntityNotFound(EntityId),

    /// Entity registered twice
    DuplicateEntity(EntityId),

    /// Snapshot could not be parsed
    Parse(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicatePeriod { entity_id, period } => {
                write!(f, "Entity {entity_id} has more than one projection for period {period}")
            }
            RegistryError::EntityNotFound(id) => write!(f, "Entity {id} not found in registry"),
            RegistryError::DuplicateEntity(id) => write!(f, "Entity {id} is already registered"),
            RegistryError::Parse(msg) => write!(f, "Failed to parse roster snapshot: {msg}"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Parse(err.to_string())
    }
}
