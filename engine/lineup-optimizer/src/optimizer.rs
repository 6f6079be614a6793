use crate::error::{OptimizerError, Result};
use crate::formation::{formation_label, FormationTemplate, LINEUP_SIZE};
use crate::recommendation::{rank_recommendations, swap_recommendations, Recommendation};
use player_registry::{Entity, EntityId, Role};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};

/// Role -> entities sorted by projected points, best first
pub type RolePools = BTreeMap<Role, Vec<SelectedEntity>>;

/// A roster entry with its resolved projection for the current period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterSlot {
    pub entity: Entity,
    pub projected_points: Option<f64>,
}

impl RosterSlot {
    pub fn new(entity: Entity, projected_points: Option<f64>) -> Self {
        Self { entity, projected_points }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedEntity {
    pub entity_id: EntityId,
    pub name: String,
    pub role: Role,
    pub projected_points: f64,
}

/// A role the roster cannot fill for a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub role: Role,
    pub required: usize,
    pub available: usize,
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: need {}, have {}", self.role, self.required, self.available)
    }
}

/// Best lineup for one template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupResult {
    pub template: FormationTemplate,
    pub selected: Vec<SelectedEntity>,
    pub total_points: f64,
    pub valid: bool,
    pub shortfalls: Vec<Shortfall>,
    /// Human-readable shortfall summary for invalid templates
    pub reason: Option<String>,
}

/// Starters currently picked by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentLineup {
    pub starters: Vec<EntityId>,
}

impl CurrentLineup {
    pub fn new(starters: Vec<EntityId>) -> Self {
        Self { starters }
    }
}

/// How the current lineup compares with the recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupAssessment {
    pub formation: String,
    pub starters: Vec<SelectedEntity>,
    pub total_points: f64,
    pub formation_differs: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// Valid templates by descending total, then invalid templates
    pub ranked: Vec<LineupResult>,
    /// Top valid template
    pub recommended: Option<LineupResult>,
    pub current: Option<LineupAssessment>,
    /// Ordered by descending impact
    pub recommendations: Vec<Recommendation>,
    /// Optimal total minus current total
    pub improvement: f64,
    /// Current total / optimal total
    pub efficiency: Option<f64>,
    pub already_optimal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Minimum point gain for a swap or formation change to be recommended
    pub materiality_threshold: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { materiality_threshold: crate::DEFAULT_MATERIALITY_THRESHOLD }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LineupOptimizer {
    config: OptimizerConfig,
}

impl LineupOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Rank every template against the roster and compare with `current`
    pub fn optimize(
        &self,
        roster: &[RosterSlot],
        templates: &[FormationTemplate],
        current: Option<&CurrentLineup>,
    ) -> Result<OptimizationReport> {
        let pools = build_pools(roster)?;

        let mut ranked: Vec<LineupResult> =
            templates.par_iter().map(|template| evaluate_template(&pools, template)).collect();
        ranked.sort_by(|a, b| {
            b.valid.cmp(&a.valid).then_with(|| b.total_points.total_cmp(&a.total_points))
        });
        let recommended = ranked.first().filter(|r| r.valid).cloned();

        let mut report = OptimizationReport {
            ranked,
            recommended,
            current: None,
            recommendations: Vec::new(),
            improvement: 0.0,
            efficiency: None,
            already_optimal: false,
        };

        if let Some(lineup) = current {
            self.compare_current(&pools, templates, lineup, &mut report)?;
        }

        match &report.recommended {
            Some(best) => info!(
                "⚽ Recommended {} with {:.2} points ({} of {} templates valid, {} recommendations)",
                best.template,
                best.total_points,
                report.ranked.iter().filter(|r| r.valid).count(),
                report.ranked.len(),
                report.recommendations.len()
            ),
            None => info!("No template can be filled from a roster of {}", roster.len()),
        }
        Ok(report)
    }

    fn compare_current(
        &self,
        pools: &RolePools,
        templates: &[FormationTemplate],
        lineup: &CurrentLineup,
        report: &mut OptimizationReport,
    ) -> Result<()> {
        let index: HashMap<EntityId, &SelectedEntity> =
            pools.values().flatten().map(|e| (e.entity_id, e)).collect();

        let mut seen = HashSet::new();
        let mut starters = Vec::with_capacity(lineup.starters.len());
        let mut counts: BTreeMap<Role, usize> = BTreeMap::new();
        for id in &lineup.starters {
            if !seen.insert(*id) {
                return Err(OptimizerError::DuplicateStarter(*id));
            }
            let entity = index.get(id).ok_or(OptimizerError::UnknownEntity(*id))?;
            *counts.entry(entity.role).or_default() += 1;
            starters.push((*entity).clone());
        }

        let formation = formation_label(&counts);
        let legal = starters.len() == LINEUP_SIZE
            && templates.iter().any(|template| {
                Role::ALL
                    .iter()
                    .all(|role| template.required(*role) == counts.get(role).copied().unwrap_or(0))
            });
        if !legal {
            return Err(OptimizerError::IllegalLineup { formation, starters: starters.len() });
        }

        let current_total: f64 = starters.iter().map(|e| e.projected_points).sum();
        let formation_differs =
            report.recommended.as_ref().is_some_and(|best| best.template.name != formation);

        let threshold = self.config.materiality_threshold;
        let mut recommendations = swap_recommendations(pools, &seen, threshold);

        if let Some(best) = &report.recommended {
            let gap = best.total_points - current_total;
            if formation_differs && gap > threshold {
                recommendations.push(Recommendation::FormationChange {
                    from: formation.clone(),
                    to: best.template.name.clone(),
                    gain: gap,
                });
            }
            report.improvement = gap;
            report.efficiency = Some(if best.total_points.abs() < f64::EPSILON {
                1.0
            } else {
                current_total / best.total_points
            });
        }
        rank_recommendations(&mut recommendations);

        report.already_optimal = recommendations.is_empty() && report.improvement.abs() < 1e-9;
        report.recommendations = recommendations;
        report.current = Some(LineupAssessment {
            formation,
            starters,
            total_points: current_total,
            formation_differs,
        });
        Ok(())
    }
}

/// Group the roster by role and sort each group best first (ties by id)
pub fn build_pools(roster: &[RosterSlot]) -> Result<RolePools> {
    let mut seen = HashSet::new();
    let mut pools: RolePools = BTreeMap::new();
    for slot in roster {
        let entity_id = slot.entity.id;
        if !seen.insert(entity_id) {
            return Err(OptimizerError::DuplicateEntity(entity_id));
        }
        let projected_points = slot
            .projected_points
            .filter(|p| p.is_finite())
            .ok_or(OptimizerError::MissingProjection { entity_id })?;
        pools.entry(slot.entity.role).or_default().push(SelectedEntity {
            entity_id,
            name: slot.entity.name.clone(),
            role: slot.entity.role,
            projected_points,
        });
    }
    for pool in pools.values_mut() {
        pool.sort_by(|a, b| {
            b.projected_points
                .total_cmp(&a.projected_points)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
    }
    Ok(pools)
}

/// Fill one template from the role pools
pub fn evaluate_template(pools: &RolePools, template: &FormationTemplate) -> LineupResult {
    let shortfalls: Vec<Shortfall> = template
        .requirements
        .iter()
        .filter_map(|(role, &required)| {
            let available = pools.get(role).map_or(0, Vec::len);
            (available < required).then_some(Shortfall { role: *role, required, available })
        })
        .collect();

    if !shortfalls.is_empty() {
        let reason = shortfalls.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
        debug!("Template {} infeasible: {}", template, reason);
        return LineupResult {
            template: template.clone(),
            selected: Vec::new(),
            total_points: 0.0,
            valid: false,
            shortfalls,
            reason: Some(reason),
        };
    }

    let selected: Vec<SelectedEntity> = template
        .requirements
        .iter()
        .flat_map(|(role, &required)| {
            pools.get(role).into_iter().flatten().take(required).cloned()
        })
        .collect();
    let total_points = selected.iter().map(|e| e.projected_points).sum();
    debug!("Template {} totals {:.2}", template, total_points);

    LineupResult {
        template: template.clone(),
        selected,
        total_points,
        valid: true,
        shortfalls: Vec::new(),
        reason: None,
    }
}
