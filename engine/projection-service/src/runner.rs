//! One projection run: calibrate, fit, project, optimize

use crate::config::ServiceConfig;
use crate::snapshot::LeagueSnapshot;
use anyhow::{anyhow, Context, Result};
use lineup_optimizer::{FormationTemplate, LineupOptimizer, OptimizationReport, RosterSlot};
use player_registry::{Entity, EntityId, PlayerRegistry, ProjectionSeries, Role};
use projection_engine::{
    ActualPoints, CalibrationResult, EntityInput, EntityProjection, ProjectionPipeline,
    ReferenceData,
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Everything the service emits for one run
#[derive(Debug, Clone, Serialize)]
pub struct ProjectionReport {
    pub target_period: u32,
    pub calibration: CalibrationResult,
    /// Roles with a fitted bias-correction model
    pub corrected_roles: Vec<Role>,
    pub projections: Vec<EntityProjection>,
    /// Lineup entities left out of optimization for lack of a target-period projection
    pub unprojected: Vec<EntityId>,
    pub lineup: OptimizationReport,
}

/// Reference data from the configured file, or the built-in tables
pub fn load_reference(config: &ServiceConfig, override_path: Option<&Path>) -> Result<ReferenceData> {
    match override_path.or(config.service.reference_file.as_deref()) {
        Some(path) => {
            info!("Loading reference data from {:?}", path);
            ReferenceData::load_from_file(path)
                .with_context(|| format!("Failed to load reference data: {:?}", path))
        }
        None => Ok(ReferenceData::default()),
    }
}

pub fn run(
    config: &ServiceConfig,
    reference: ReferenceData,
    snapshot: LeagueSnapshot,
) -> Result<ProjectionReport> {
    let target_period = snapshot
        .target_period
        .ok_or_else(|| anyhow!("Snapshot does not name a target_period"))?;
    let completed = snapshot.completed_through();

    let registry =
        PlayerRegistry::from_snapshot(snapshot.roster).context("Failed to build roster")?;

    let pipeline = ProjectionPipeline::new(config.engine.clone(), reference);
    let engine = pipeline.calibration_engine();
    let calibration = match completed {
        Some(last) => engine.calibrate_completed(
            &snapshot.source_actuals,
            &snapshot.target_actuals,
            last,
        ),
        None => engine.static_result(),
    };
    let mut pipeline = pipeline.with_calibration(calibration.clone());

    let series: Vec<(&Entity, ProjectionSeries)> =
        registry.entities().map(|e| (e, registry.projections_for(e.id))).collect();
    let inputs: Vec<EntityInput<'_>> =
        series.iter().map(|(entity, s)| EntityInput::new(entity, s)).collect();

    let mut corrected_roles = Vec::new();
    if config.service.fit_correction {
        let history: Vec<ActualPoints> = snapshot
            .target_actuals
            .iter()
            .filter(|a| completed.is_some_and(|last| a.period <= last))
            .copied()
            .collect();
        if history.is_empty() {
            info!("No target actuals; skipping bias correction");
        } else {
            let model = pipeline.fit_correction(&inputs, &history);
            corrected_roles = Role::ALL.into_iter().filter(|r| model.is_trained(*r)).collect();
            pipeline = pipeline.with_correction(model);
        }
    }

    let projections = pipeline
        .project_roster(&inputs, target_period)
        .context("Failed to project roster")?;

    let (roster, unprojected) = lineup_roster(&registry, &projections);
    let optimizer = LineupOptimizer::new(config.optimizer.clone());
    let lineup = optimizer
        .optimize(&roster, &FormationTemplate::standard_set(), snapshot.current_lineup.as_ref())
        .context("Failed to optimize lineup")?;

    Ok(ProjectionReport {
        target_period,
        calibration,
        corrected_roles,
        projections,
        unprojected,
        lineup,
    })
}

/// Entities the user owns (or the whole registry when nobody is marked owned)
fn lineup_roster(
    registry: &PlayerRegistry,
    projections: &[EntityProjection],
) -> (Vec<RosterSlot>, Vec<EntityId>) {
    let owned = registry.owned_by_self();
    let candidates: Vec<&Entity> =
        if owned.is_empty() { registry.entities().collect() } else { owned };

    let points: HashMap<EntityId, Option<f64>> =
        projections.iter().map(|p| (p.entity_id, p.final_points)).collect();

    let mut roster = Vec::with_capacity(candidates.len());
    let mut unprojected = Vec::new();
    for entity in candidates {
        match points.get(&entity.id).copied().flatten() {
            Some(projected) => roster.push(RosterSlot::new(entity.clone(), Some(projected))),
            None => unprojected.push(entity.id),
        }
    }
    if !unprojected.is_empty() {
        warn!("{} entities have no projection for the target period", unprojected.len());
    }
    (roster, unprojected)
}
