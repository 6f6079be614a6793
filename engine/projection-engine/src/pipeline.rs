//! Per-entity projection pipeline
//!
//! Runs conversion, the optional ML estimate and the consensus step for each
//! entity in a roster. Entities are independent, so a roster fans out across
//! the rayon pool and is collected back in input order.

use crate::archetype::ArchetypeClassifier;
use crate::calibration::{ActualPoints, CalibrationEngine, CalibrationResult};
use crate::config::EngineConfig;
use crate::consensus::{ConsensusResult, ConsensusValidator};
use crate::converter::{RatioSource, ScoreConverter};
use crate::correction::{BiasCorrectionModel, CorrectionFeatures, CorrectionSample};
use crate::error::Result;
use crate::models::{ConvertedProjection, Estimate};
use crate::reference::ReferenceData;
use player_registry::{Entity, EntityId, PlayerRegistry, ProjectionSeries, Role};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Everything projected for one entity in the target period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityProjection {
    pub entity_id: EntityId,
    pub role: Role,
    pub converted: ConvertedProjection,
    pub ml_estimate: Option<Estimate>,
    pub consensus: Option<ConsensusResult>,
    /// Consensus points when available, else the converted target-period points
    pub final_points: Option<f64>,
}

/// One roster entry handed to the pipeline
#[derive(Debug, Clone, Copy)]
pub struct EntityInput<'a> {
    pub entity: &'a Entity,
    pub series: &'a ProjectionSeries,
}

impl<'a> EntityInput<'a> {
    pub fn new(entity: &'a Entity, series: &'a ProjectionSeries) -> Self {
        Self { entity, series }
    }
}

pub struct ProjectionPipeline {
    config: EngineConfig,
    reference: ReferenceData,
    calibration: Option<CalibrationResult>,
    correction: Option<BiasCorrectionModel>,
    consensus: ConsensusValidator,
}

impl ProjectionPipeline {
    pub fn new(config: EngineConfig, reference: ReferenceData) -> Self {
        let consensus = ConsensusValidator::new(config.consensus.clone());
        Self { config, reference, calibration: None, correction: None, consensus }
    }

    /// Use calibrated ratios instead of archetype ratios
    pub fn with_calibration(mut self, calibration: CalibrationResult) -> Self {
        self.calibration = Some(calibration);
        self
    }

    /// Enable the ML estimate and the consensus step
    pub fn with_correction(mut self, correction: BiasCorrectionModel) -> Self {
        self.correction = Some(correction);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn calibration(&self) -> Option<&CalibrationResult> {
        self.calibration.as_ref()
    }

    pub fn correction(&self) -> Option<&BiasCorrectionModel> {
        self.correction.as_ref()
    }

    /// Calibration engine sharing this pipeline's config and reference data
    pub fn calibration_engine(&self) -> CalibrationEngine {
        CalibrationEngine::new(self.config.calibration.clone(), &self.reference)
    }

    fn ratio_source(&self) -> RatioSource<'_> {
        match &self.calibration {
            Some(calibration) => RatioSource::Calibrated(calibration),
            None => RatioSource::Archetype,
        }
    }

    fn converter(&self) -> ScoreConverter<'_> {
        ScoreConverter::new(&self.config.converter, ArchetypeClassifier::new(&self.reference))
    }

    /// Project a single entity for `target_period`
    pub fn project(
        &self,
        entity: &Entity,
        series: &ProjectionSeries,
        target_period: Option<u32>,
    ) -> Result<EntityProjection> {
        let converted =
            self.converter().convert(entity, series, target_period, self.ratio_source())?;

        let ml_estimate = self.correction.as_ref().and_then(|model| model.estimate(&converted));
        let consensus = match (ml_estimate, converted.target_period_points) {
            (Some(ml), Some(points)) => {
                let statistical = Estimate::new(points, self.consensus.label_score(converted.confidence));
                let baseline = converted.source.target_period_points.unwrap_or(0.0);
                Some(self.consensus.reconcile(statistical, ml, baseline))
            }
            _ => None,
        };

        let final_points = consensus.as_ref().map(|c| c.points).or(converted.target_period_points);
        if let Some(result) = &consensus {
            debug!(
                "Entity {} consensus {:.2} ({:?}, confidence {:.0})",
                entity.id, result.points, result.agreement, result.confidence
            );
        }

        Ok(EntityProjection {
            entity_id: entity.id,
            role: entity.role,
            converted,
            ml_estimate,
            consensus,
            final_points,
        })
    }

    /// Project every input in parallel, preserving input order
    pub fn project_roster(
        &self,
        inputs: &[EntityInput<'_>],
        target_period: u32,
    ) -> Result<Vec<EntityProjection>> {
        let projections = inputs
            .par_iter()
            .map(|input| self.project(input.entity, input.series, Some(target_period)))
            .collect::<Result<Vec<_>>>()?;

        let projected = projections.iter().filter(|p| p.final_points.is_some()).count();
        let reconciled = projections.iter().filter(|p| p.consensus.is_some()).count();
        info!(
            "📊 Projected {} entities for period {} ({} with points, {} reconciled)",
            projections.len(),
            target_period,
            projected,
            reconciled
        );
        Ok(projections)
    }

    /// Project every entity held by a registry
    pub fn project_registry(
        &self,
        registry: &PlayerRegistry,
        target_period: u32,
    ) -> Result<Vec<EntityProjection>> {
        let series: Vec<(&Entity, ProjectionSeries)> =
            registry.entities().map(|e| (e, registry.projections_for(e.id))).collect();
        let inputs: Vec<EntityInput<'_>> =
            series.iter().map(|(entity, s)| EntityInput::new(entity, s)).collect();
        self.project_roster(&inputs, target_period)
    }

    /// Training samples for the correction model
    ///
    /// Each realized target-system observation is paired with what the
    /// converter would have predicted for that period.
    pub fn correction_samples(
        &self,
        inputs: &[EntityInput<'_>],
        target_actuals: &[ActualPoints],
    ) -> Vec<CorrectionSample> {
        let by_id: HashMap<EntityId, &EntityInput<'_>> =
            inputs.iter().map(|input| (input.entity.id, input)).collect();
        let converter = self.converter();
        let ratio_source = self.ratio_source();

        target_actuals
            .iter()
            .filter_map(|actual| {
                let points = actual.points.filter(|p| p.is_finite())?;
                let input = by_id.get(&actual.entity_id)?;
                let converted = converter
                    .convert(input.entity, input.series, Some(actual.period), ratio_source)
                    .ok()?;
                let predicted = converted.target_period_points?;
                Some(CorrectionSample {
                    role: input.entity.role,
                    features: CorrectionFeatures::from_breakdown(&converted.factors),
                    predicted,
                    actual: points,
                })
            })
            .collect()
    }

    /// Fit a correction model from historical target actuals
    pub fn fit_correction(
        &self,
        inputs: &[EntityInput<'_>],
        target_actuals: &[ActualPoints],
    ) -> BiasCorrectionModel {
        let samples = self.correction_samples(inputs, target_actuals);
        debug!("Built {} correction samples", samples.len());
        BiasCorrectionModel::fit(self.config.correction.clone(), &samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorrectionConfig;
    use crate::consensus::AgreementTier;
    use player_registry::PeriodProjection;

    fn series(id: u32, points: f64, periods: u32) -> ProjectionSeries {
        let rows =
            (1..=periods).map(|gw| PeriodProjection::new(gw, Some(points)).with_minutes(90.0)).collect();
        ProjectionSeries::new(EntityId(id), rows).unwrap()
    }

    fn pipeline() -> ProjectionPipeline {
        ProjectionPipeline::new(EngineConfig::default(), ReferenceData::default())
    }

    #[test]
    fn test_project_without_correction_uses_converted_points() {
        let entity = Entity::new(1, "Unlisted", Role::Defender, "XXX");
        let result = pipeline().project(&entity, &series(1, 5.0, 10), Some(6)).unwrap();

        assert!(result.consensus.is_none());
        assert!(result.ml_estimate.is_none());
        assert!((result.final_points.unwrap() - 5.5).abs() < 1e-9);
    }

    fn unbiased_defender_model() -> BiasCorrectionModel {
        let features = CorrectionFeatures { form: 1.0, fixture: 1.0, minutes_share: 1.0 };
        let samples: Vec<CorrectionSample> = (0..10)
            .map(|i| CorrectionSample {
                role: Role::Defender,
                features,
                predicted: 4.0 + i as f64,
                actual: 4.0 + i as f64,
            })
            .collect();
        BiasCorrectionModel::fit(CorrectionConfig::default(), &samples)
    }

    fn flat_minutes_series(id: u32, points: f64, minutes: f64) -> ProjectionSeries {
        let rows =
            (1..=10).map(|gw| PeriodProjection::new(gw, Some(points)).with_minutes(minutes)).collect();
        ProjectionSeries::new(EntityId(id), rows).unwrap()
    }

    #[test]
    fn test_untrained_role_skips_consensus() {
        let entity = Entity::new(1, "Unlisted", Role::Defender, "XXX");
        let pipeline =
            pipeline().with_correction(BiasCorrectionModel::untrained(CorrectionConfig::default()));
        let result = pipeline.project(&entity, &series(1, 5.0, 10), Some(6)).unwrap();

        assert!(result.ml_estimate.is_none());
        assert!(result.consensus.is_none());
        assert!((result.final_points.unwrap() - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_trained_correction_reconciles() {
        let entity = Entity::new(1, "Unlisted", Role::Defender, "XXX");
        let pipeline = pipeline().with_correction(unbiased_defender_model());
        let result = pipeline.project(&entity, &series(1, 5.0, 10), Some(6)).unwrap();

        let consensus = result.consensus.unwrap();
        // neutral factors and a unit multiplier: both estimates equal 5.5
        assert_eq!(consensus.agreement, AgreementTier::Strong);
        assert!((consensus.points - 5.5).abs() < 1e-9);
        assert_eq!(consensus.breakdown.baseline, 5.0);
        // min(70 medium label, 55 for 10 samples) + 15
        assert!((consensus.confidence - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_correction_keeps_injury_factor() {
        let entity = Entity::new(1, "Unlisted", Role::Defender, "XXX")
            .with_status("i")
            .with_news("Knee injury");
        let pipeline = pipeline().with_correction(unbiased_defender_model());
        let result = pipeline.project(&entity, &flat_minutes_series(1, 6.0, 90.0), Some(6)).unwrap();

        // 6.0 x 1.1 x 0.5
        assert!((result.converted.target_period_points.unwrap() - 3.3).abs() < 1e-9);
        assert!((result.ml_estimate.unwrap().points - 3.3).abs() < 1e-9);
        assert_eq!(result.consensus.as_ref().unwrap().agreement, AgreementTier::Strong);
        assert!((result.final_points.unwrap() - 3.3).abs() < 1e-9);
    }

    #[test]
    fn test_correction_keeps_playing_time_factor() {
        let entity = Entity::new(1, "Unlisted", Role::Defender, "XXX");
        let pipeline = pipeline().with_correction(unbiased_defender_model());
        let result = pipeline.project(&entity, &flat_minutes_series(1, 6.0, 20.0), Some(6)).unwrap();

        // 6.0 x 1.1 x 0.40
        assert!((result.ml_estimate.unwrap().points - 2.64).abs() < 1e-9);
        assert!((result.final_points.unwrap() - 2.64).abs() < 1e-9);
    }

    #[test]
    fn test_project_roster_preserves_order() {
        let entities: Vec<Entity> = (1..=20)
            .map(|id| Entity::new(id, format!("Entity {id}"), Role::Midfielder, "XXX"))
            .collect();
        let series: Vec<ProjectionSeries> =
            (1..=20).map(|id| series(id, id as f64, 8)).collect();
        let inputs: Vec<EntityInput<'_>> =
            entities.iter().zip(&series).map(|(e, s)| EntityInput::new(e, s)).collect();

        let results = pipeline().project_roster(&inputs, 4).unwrap();
        let ids: Vec<u32> = results.iter().map(|r| r.entity_id.0).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_project_roster_propagates_mismatch() {
        let entity = Entity::new(1, "A", Role::Forward, "XXX");
        let wrong = series(2, 3.0, 5);
        let inputs = [EntityInput::new(&entity, &wrong)];
        assert!(pipeline().project_roster(&inputs, 3).is_err());
    }

    #[test]
    fn test_correction_samples_from_history() {
        let entity = Entity::new(1, "Unlisted", Role::Forward, "XXX");
        let s = series(1, 4.0, 10);
        let inputs = [EntityInput::new(&entity, &s)];
        let actuals: Vec<ActualPoints> = (1..=10)
            .map(|gw| ActualPoints::new(EntityId(1), Role::Forward, gw, Some(5.0)))
            .chain(std::iter::once(ActualPoints::new(EntityId(9), Role::Forward, 1, Some(2.0))))
            .collect();

        let samples = pipeline().correction_samples(&inputs, &actuals);
        assert_eq!(samples.len(), 10);
        // 4.0 x forward default 0.95
        assert!((samples[0].predicted - 3.8).abs() < 1e-9);
        assert_eq!(samples[0].actual, 5.0);

        let model = pipeline().fit_correction(&inputs, &actuals);
        assert!(model.is_trained(Role::Forward));
    }

    #[test]
    fn test_project_registry_covers_every_entity() {
        let registry = PlayerRegistry::from_json_str(
            r#"{
                "entities": [
                    {"id": 2, "name": "B", "role": "MID", "team": "XXX"},
                    {"id": 1, "name": "A", "role": "DEF", "team": "XXX"}
                ],
                "projections": [
                    {"entity_id": 1, "projections": [{"gw": 3, "xP": 4.0, "xmins": 90}]}
                ]
            }"#,
        )
        .unwrap();

        let results = pipeline().project_registry(&registry, 3).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entity_id, EntityId(1));
        assert!(results[0].final_points.is_some());
        // no rows at all for entity 2
        assert_eq!(results[1].final_points, None);
    }
}
