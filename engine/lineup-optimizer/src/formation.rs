use player_registry::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Players in a starting lineup
pub const LINEUP_SIZE: usize = 11;

/// A legal lineup shape: required starters per role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormationTemplate {
    /// Outfield shape, e.g. "4-4-2"
    pub name: String,
    pub requirements: BTreeMap<Role, usize>,
}

impl FormationTemplate {
    pub fn new(name: impl Into<String>, requirements: &[(Role, usize)]) -> Self {
        Self { name: name.into(), requirements: requirements.iter().copied().collect() }
    }

    /// One goalkeeper plus the given outfield shape
    pub fn outfield(defenders: usize, midfielders: usize, forwards: usize) -> Self {
        Self::new(
            format!("{defenders}-{midfielders}-{forwards}"),
            &[
                (Role::Goalkeeper, 1),
                (Role::Defender, defenders),
                (Role::Midfielder, midfielders),
                (Role::Forward, forwards),
            ],
        )
    }

    /// The six standard formations
    pub fn standard_set() -> Vec<Self> {
        vec![
            Self::outfield(3, 4, 3),
            Self::outfield(3, 5, 2),
            Self::outfield(4, 3, 3),
            Self::outfield(4, 4, 2),
            Self::outfield(4, 5, 1),
            Self::outfield(5, 3, 2),
        ]
    }

    pub fn required(&self, role: Role) -> usize {
        self.requirements.get(&role).copied().unwrap_or(0)
    }

    /// Total starters the template asks for
    pub fn headcount(&self) -> usize {
        self.requirements.values().sum()
    }
}

impl fmt::Display for FormationTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// "D-M-F" label for an arbitrary set of role counts
pub fn formation_label(counts: &BTreeMap<Role, usize>) -> String {
    let count = |role: Role| counts.get(&role).copied().unwrap_or(0);
    format!(
        "{}-{}-{}",
        count(Role::Defender),
        count(Role::Midfielder),
        count(Role::Forward)
    )
}
