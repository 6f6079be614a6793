//! Static reference data: archetype tables and per-role default ratios
//!
//! Loaded once as configuration and shared read-only across a batch.

use crate::error::{ProjectionError, Result};
use player_registry::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A named behavioral cluster within one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeProfile {
    pub name: String,
    /// Target/source conversion ratio for entities in this archetype
    pub ratio: f64,
    pub description: String,
    /// Display names of entities known to fit the archetype
    #[serde(default)]
    pub members: Vec<String>,
}

/// Reference tables threaded explicitly through every conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    /// Role -> archetypes; an archetype belongs to exactly one role
    pub archetypes: BTreeMap<Role, Vec<ArchetypeProfile>>,

    /// Role -> ratio used when no archetype matches
    pub position_defaults: BTreeMap<Role, f64>,

    /// Ratio used when the role has no reference entry at all
    #[serde(default = "default_fallback_ratio")]
    pub fallback_ratio: f64,
}

fn default_fallback_ratio() -> f64 {
    1.0
}

impl ReferenceData {
    /// Parse reference tables from JSON and validate them
    pub fn from_json_str(json: &str) -> Result<Self> {
        let data: ReferenceData = serde_json::from_str(json)?;
        data.validate()?;
        Ok(data)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(&path).map_err(|e| {
            ProjectionError::ReferenceData(format!("{:?}: {e}", path.as_ref()))
        })?;
        Self::from_json_str(&json)
    }

    /// Ratios must be positive and archetype names unique across all roles
    pub fn validate(&self) -> Result<()> {
        let mut seen: BTreeMap<&str, Role> = BTreeMap::new();
        for (role, profiles) in &self.archetypes {
            for profile in profiles {
                if !(profile.ratio.is_finite() && profile.ratio > 0.0) {
                    return Err(ProjectionError::ReferenceData(format!(
                        "archetype '{}' has invalid ratio {}",
                        profile.name, profile.ratio
                    )));
                }
                if let Some(other) = seen.insert(profile.name.as_str(), *role) {
                    return Err(ProjectionError::ReferenceData(format!(
                        "archetype '{}' listed under both {} and {}",
                        profile.name, other, role
                    )));
                }
            }
        }
        if let Some((role, ratio)) =
            self.position_defaults.iter().find(|(_, r)| !(r.is_finite() && **r > 0.0))
        {
            return Err(ProjectionError::ReferenceData(format!(
                "position default for {role} is invalid: {ratio}"
            )));
        }
        Ok(())
    }

    /// Ratio for a role with no archetype match, if the role is known
    pub fn position_default(&self, role: Role) -> Option<f64> {
        self.position_defaults.get(&role).copied()
    }

    /// Static per-role ratios used as the calibration fallback
    pub fn static_role_ratios(&self) -> BTreeMap<Role, f64> {
        Role::ALL
            .iter()
            .map(|role| (*role, self.position_default(*role).unwrap_or(self.fallback_ratio)))
            .collect()
    }
}

impl Default for ReferenceData {
    fn default() -> Self {
        let mut archetypes = BTreeMap::new();
        archetypes.insert(
            Role::Goalkeeper,
            vec![
                profile("Shot Stopper", 1.15, "High save volume behind a busy defence", &[
                    "Jordan Pickford",
                    "Andre Onana",
                    "Bernd Leno",
                ]),
                profile("Sweeper Keeper", 1.05, "Low save volume, clean-sheet driven", &[
                    "Alisson",
                    "Ederson",
                    "David Raya",
                ]),
            ],
        );
        archetypes.insert(
            Role::Defender,
            vec![
                profile("Attacking Full-Back", 1.20, "Crosses, key passes and overlaps", &[
                    "Trent Alexander-Arnold",
                    "Pedro Porro",
                    "Kieran Trippier",
                ]),
                profile("Ball-Playing Centre-Back", 1.05, "Progressive passing from deep", &[
                    "Virgil van Dijk",
                    "William Saliba",
                    "Ruben Dias",
                ]),
                profile("Stopper", 0.95, "Clearances and blocks, little on the ball", &[
                    "James Tarkowski",
                    "Joachim Andersen",
                ]),
            ],
        );
        archetypes.insert(
            Role::Midfielder,
            vec![
                profile("Creative Playmaker", 1.15, "Chance creation and set pieces", &[
                    "Bruno Fernandes",
                    "Martin Odegaard",
                    "Kevin De Bruyne",
                ]),
                profile("Defensive Anchor", 1.25, "Tackles, interceptions and recoveries", &[
                    "Declan Rice",
                    "Rodri",
                    "Moises Caicedo",
                ]),
                profile("Inside Forward", 0.95, "Goal-led returns from wide areas", &[
                    "Mohamed Salah",
                    "Bukayo Saka",
                    "Son Heung-Min",
                ]),
            ],
        );
        archetypes.insert(
            Role::Forward,
            vec![
                profile("High-Pressing Forward", 1.05, "Defensive actions from the front", &[
                    "Ollie Watkins",
                    "Dominic Solanke",
                ]),
                profile("Poacher", 0.85, "Box presence, few actions outside goals", &[
                    "Erling Haaland",
                    "Alexander Isak",
                ]),
                profile("Target Man", 0.95, "Aerial duels and hold-up play", &[
                    "Chris Wood",
                    "Dominic Calvert-Lewin",
                ]),
            ],
        );

        let position_defaults = [
            (Role::Goalkeeper, 1.05),
            (Role::Defender, 1.10),
            (Role::Midfielder, 1.00),
            (Role::Forward, 0.95),
        ]
        .into_iter()
        .collect();

        Self { archetypes, position_defaults, fallback_ratio: default_fallback_ratio() }
    }
}

fn profile(name: &str, ratio: f64, description: &str, members: &[&str]) -> ArchetypeProfile {
    ArchetypeProfile {
        name: name.to_string(),
        ratio,
        description: description.to_string(),
        members: members.iter().map(|m| m.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reference_is_valid() {
        let data = ReferenceData::default();
        assert!(data.validate().is_ok());
        assert_eq!(data.archetypes.len(), 4);
        assert_eq!(data.position_default(Role::Defender), Some(1.10));
    }

    #[test]
    fn test_duplicate_archetype_across_roles_rejected() {
        let mut data = ReferenceData::default();
        data.archetypes
            .get_mut(&Role::Forward)
            .unwrap()
            .push(profile("Stopper", 1.0, "misfiled", &[]));
        assert!(matches!(data.validate(), Err(ProjectionError::ReferenceData(_))));
    }

    #[test]
    fn test_static_role_ratios_fill_missing_roles() {
        let mut data = ReferenceData::default();
        data.position_defaults.remove(&Role::Forward);
        let ratios = data.static_role_ratios();
        assert_eq!(ratios.len(), 4);
        assert_eq!(ratios[&Role::Forward], 1.0);
    }

    #[test]
    fn test_json_round_trip_uses_role_codes() {
        let json = serde_json::to_string(&ReferenceData::default()).unwrap();
        assert!(json.contains("\"DEF\""));
        let parsed = ReferenceData::from_json_str(&json).unwrap();
        assert_eq!(parsed.archetypes[&Role::Midfielder].len(), 3);
        assert!((parsed.position_defaults[&Role::Goalkeeper] - 1.05).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let json = r#"{"archetypes": {}, "position_defaults": {"GK": -1.0}}"#;
        assert!(ReferenceData::from_json_str(json).is_err());
    }
}
