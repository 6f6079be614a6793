use crate::optimizer::{RolePools, SelectedEntity};
use player_registry::{EntityId, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// An actionable change to the current lineup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recommendation {
    /// Bring `bench` in for `starter` within the same role
    Swap { role: Role, bench: SelectedEntity, starter: SelectedEntity, delta: f64 },
    /// Move to a different formation
    FormationChange { from: String, to: String, gain: f64 },
}

impl Recommendation {
    /// Projected points gained by acting on the recommendation
    pub fn impact(&self) -> f64 {
        match self {
            Recommendation::Swap { delta, .. } => *delta,
            Recommendation::FormationChange { gain, .. } => *gain,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Swap { role, bench, starter, delta } => write!(
                f,
                "{role}: start {} ({:.1}) over {} ({:.1}), +{:.1}",
                bench.name, bench.projected_points, starter.name, starter.projected_points, delta
            ),
            Recommendation::FormationChange { from, to, gain } => {
                write!(f, "Switch formation {from} -> {to}, +{gain:.1}")
            }
        }
    }
}

/// Same-role swaps where a benched entity beats a starter by more than `threshold`
///
/// The best bench entity is paired with the worst starter, the second best
/// with the second worst, and so on while the gap stays material.
pub fn swap_recommendations(
    pools: &RolePools,
    starters: &HashSet<EntityId>,
    threshold: f64,
) -> Vec<Recommendation> {
    let mut swaps = Vec::new();
    for (role, pool) in pools {
        // pools are sorted best first
        let bench = pool.iter().filter(|e| !starters.contains(&e.entity_id));
        let worst_starters = pool.iter().rev().filter(|e| starters.contains(&e.entity_id));

        for (bench, starter) in bench.zip(worst_starters) {
            let delta = bench.projected_points - starter.projected_points;
            if delta <= threshold {
                break;
            }
            swaps.push(Recommendation::Swap {
                role: *role,
                bench: bench.clone(),
                starter: starter.clone(),
                delta,
            });
        }
    }
    swaps
}

/// Order by descending impact
pub fn rank_recommendations(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| b.impact().total_cmp(&a.impact()));
}
