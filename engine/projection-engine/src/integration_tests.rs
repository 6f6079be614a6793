//! End-to-end tests across conversion, calibration, correction and consensus

use crate::calibration::{ActualPoints, CalibrationEngine};
use crate::config::{CalibrationConfig, ConverterConfig, EngineConfig};
use crate::consensus::{AgreementTier, ConsensusValidator};
use crate::converter::{RatioSource, ScoreConverter};
use crate::archetype::ArchetypeClassifier;
use crate::models::{Estimate, InjuryState, RatioOrigin};
use crate::pipeline::{EntityInput, ProjectionPipeline};
use crate::reference::ReferenceData;
use player_registry::{Entity, EntityId, PeriodProjection, ProjectionSeries, Role};
use proptest::prelude::*;

fn flat_series(id: u32, points: f64, minutes: f64, periods: u32) -> ProjectionSeries {
    let rows = (1..=periods)
        .map(|gw| PeriodProjection::new(gw, Some(points)).with_minutes(minutes))
        .collect();
    ProjectionSeries::new(EntityId(id), rows).unwrap()
}

#[test]
fn test_scenario_average_five_with_defender_ratio() {
    let entity = Entity::new(10, "Squad Defender", Role::Defender, "BOU");
    let pipeline = ProjectionPipeline::new(EngineConfig::default(), ReferenceData::default());

    let result = pipeline.project(&entity, &flat_series(10, 5.0, 90.0, 12), Some(7)).unwrap();
    let converted = &result.converted;
    assert_eq!(converted.factors.ratio.value, 1.10);
    assert!((converted.season_average - 5.5).abs() < 1e-9);
    assert_eq!(converted.factors.form.multiplier, 1.0);
    assert_eq!(converted.factors.fixture.multiplier, 1.0);
    assert_eq!(converted.factors.injury.multiplier, 1.0);
    assert_eq!(converted.factors.playing_time.multiplier, 1.0);
}

#[test]
fn test_scenario_injured_without_return_signal() {
    let entity = Entity::new(11, "Crocked Forward", Role::Forward, "WOL")
        .with_status("i")
        .with_news("Knee injury");
    let rows = vec![
        PeriodProjection::new(1, Some(2.0)).with_minutes(90.0),
        PeriodProjection::new(2, Some(9.0)).with_minutes(90.0),
        PeriodProjection::new(3, Some(9.0)).with_minutes(45.0),
        PeriodProjection::new(4, Some(3.0)),
    ];
    let series = ProjectionSeries::new(EntityId(11), rows).unwrap();
    let pipeline = ProjectionPipeline::new(EngineConfig::default(), ReferenceData::default());

    let converted = pipeline.project(&entity, &series, Some(4)).unwrap().converted;
    let factors = &converted.factors;
    assert_eq!(factors.injury.state, InjuryState::Injured);
    assert_eq!(factors.injury.multiplier, 0.5);

    let others = factors.ratio.value
        * factors.form.multiplier
        * factors.fixture.multiplier
        * factors.playing_time.multiplier;
    assert!((factors.combined - others * 0.5).abs() < 1e-12);
    assert!((converted.target_period_points.unwrap() - 3.0 * others * 0.5).abs() < 1e-9);
}

#[test]
fn test_calibrated_pipeline_end_to_end() {
    let reference = ReferenceData::default();
    let engine = CalibrationEngine::new(CalibrationConfig::default(), &reference);

    let mut source = Vec::new();
    let mut target = Vec::new();
    for id in 1..=4u32 {
        for gw in 1..=6u32 {
            source.push(ActualPoints::new(EntityId(id), Role::Midfielder, gw, Some(4.0)));
            target.push(ActualPoints::new(EntityId(id), Role::Midfielder, gw, Some(5.2)));
        }
    }
    // a blank gameweek and a wild outlier
    source.push(ActualPoints::new(EntityId(1), Role::Midfielder, 7, Some(0.0)));
    target.push(ActualPoints::new(EntityId(1), Role::Midfielder, 7, Some(2.0)));
    source.push(ActualPoints::new(EntityId(2), Role::Midfielder, 7, Some(1.0)));
    target.push(ActualPoints::new(EntityId(2), Role::Midfielder, 7, Some(12.0)));

    let calibration = engine.calibrate_completed(&source, &target, 7);
    assert!(calibration.calibrated);
    assert_eq!(calibration.total_samples, 24);
    assert_eq!(calibration.discarded.blank, 1);
    assert_eq!(calibration.discarded.implausible, 1);

    let pipeline = ProjectionPipeline::new(EngineConfig::default(), reference)
        .with_calibration(calibration);
    let entity = Entity::new(3, "Box To Box", Role::Midfielder, "CRY");
    let newcomer = Entity::new(99, "Newcomer", Role::Midfielder, "CRY");
    let s3 = flat_series(3, 4.0, 90.0, 10);
    let s99 = flat_series(99, 4.0, 90.0, 10);
    let results = pipeline
        .project_roster(&[EntityInput::new(&entity, &s3), EntityInput::new(&newcomer, &s99)], 8)
        .unwrap();

    assert_eq!(results[0].converted.factors.ratio.origin, RatioOrigin::CalibratedEntity);
    assert_eq!(results[1].converted.factors.ratio.origin, RatioOrigin::CalibratedRole);
    assert!((results[0].final_points.unwrap() - 5.2).abs() < 1e-9);
    assert!((results[1].final_points.unwrap() - 5.2).abs() < 1e-9);
}

#[test]
fn test_correction_fit_feeds_consensus() {
    let pipeline = ProjectionPipeline::new(EngineConfig::default(), ReferenceData::default());
    let entities: Vec<Entity> = (1..=3)
        .map(|id| Entity::new(id, format!("Forward {id}"), Role::Forward, "XXX"))
        .collect();
    let series: Vec<ProjectionSeries> =
        (1..=3).map(|id| flat_series(id, 4.0, 90.0, 12)).collect();
    let inputs: Vec<EntityInput<'_>> =
        entities.iter().zip(&series).map(|(e, s)| EntityInput::new(e, s)).collect();

    // target system consistently scores forwards 10% above the static conversion
    let actuals: Vec<ActualPoints> = (1..=3u32)
        .flat_map(|id| {
            (1..=8u32).map(move |gw| {
                ActualPoints::new(EntityId(id), Role::Forward, gw, Some(4.0 * 0.95 * 1.1))
            })
        })
        .collect();

    let model = pipeline.fit_correction(&inputs, &actuals);
    let pipeline = pipeline.with_correction(model);
    let results = pipeline.project_roster(&inputs, 9).unwrap();

    for result in &results {
        let ml = result.ml_estimate.unwrap();
        assert!((ml.points - 4.0 * 0.95 * 1.1).abs() < 1e-6);
        let consensus = result.consensus.as_ref().unwrap();
        assert_eq!(consensus.agreement, AgreementTier::Strong);
        assert!((result.final_points.unwrap() - 4.0 * 0.95 * 1.05).abs() < 1e-6);
    }
}

fn status_strategy() -> impl Strategy<Value = (Option<String>, Option<String>)> {
    let statuses = prop_oneof![
        Just(None),
        Just(Some("a".to_string())),
        Just(Some("i".to_string())),
        Just(Some("d".to_string())),
    ];
    let news = prop_oneof![
        Just(None),
        Just(Some("Hamstring injury".to_string())),
        Just(Some("Returned to training".to_string())),
        Just(Some("Unavailable for selection".to_string())),
        Just(Some("75% chance of playing".to_string())),
    ];
    (statuses, news)
}

fn rows_strategy() -> impl Strategy<Value = Vec<(Option<f64>, Option<f64>)>> {
    prop::collection::vec(
        (prop::option::of(-3.0f64..18.0), prop::option::of(0.0f64..95.0)),
        1..24,
    )
}

fn build(
    rows: &[(Option<f64>, Option<f64>)],
    role: Role,
    status: (Option<String>, Option<String>),
) -> (Entity, ProjectionSeries) {
    let mut entity = Entity::new(7, "Property Entity", role, "XXX");
    entity.status = status.0;
    entity.news = status.1;
    let periods = rows
        .iter()
        .enumerate()
        .map(|(i, (points, minutes))| PeriodProjection {
            minutes: *minutes,
            ..PeriodProjection::new(i as u32 + 1, *points)
        })
        .collect();
    (entity, ProjectionSeries::new(EntityId(7), periods).unwrap())
}

fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Goalkeeper),
        Just(Role::Defender),
        Just(Role::Midfielder),
        Just(Role::Forward),
    ]
}

proptest! {
    /// Output is never negative and every multiplier stays inside its band
    #[test]
    fn prop_convert_within_bands(
        rows in rows_strategy(),
        role in role_strategy(),
        status in status_strategy(),
        target_offset in 0usize..24,
    ) {
        let (entity, series) = build(&rows, role, status);
        let target = (target_offset % rows.len()) as u32 + 1;
        let config = ConverterConfig::default();
        let reference = ReferenceData::default();
        let converter = ScoreConverter::new(&config, ArchetypeClassifier::new(&reference));

        let result = converter.convert(&entity, &series, Some(target), RatioSource::Archetype).unwrap();
        let f = &result.factors;

        prop_assert!(result.season_total >= 0.0);
        prop_assert!(result.season_average >= 0.0);
        prop_assert!(result.target_period_points.map_or(true, |p| p >= 0.0));
        prop_assert!((0.80..=1.20).contains(&f.form.multiplier));
        prop_assert!((0.92..=1.08).contains(&f.fixture.multiplier));
        prop_assert!([0.5, 0.70, 0.85, 0.95, 1.0].contains(&f.injury.multiplier));
        prop_assert!([0.40, 0.70, 0.75, 0.90, 1.0].contains(&f.playing_time.multiplier));
        prop_assert!(f.ratio.value > 0.0);
    }

    /// Identical inputs give byte-identical output
    #[test]
    fn prop_convert_idempotent(
        rows in rows_strategy(),
        role in role_strategy(),
        status in status_strategy(),
    ) {
        let (entity, series) = build(&rows, role, status);
        let target = rows.len() as u32;
        let config = ConverterConfig::default();
        let reference = ReferenceData::default();
        let converter = ScoreConverter::new(&config, ArchetypeClassifier::new(&reference));

        let first = converter.convert(&entity, &series, Some(target), RatioSource::Archetype).unwrap();
        let second = converter.convert(&entity, &series, Some(target), RatioSource::Archetype).unwrap();
        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    /// target = source x k for one role recovers k
    #[test]
    fn prop_calibration_recovers_constant_ratio(
        k in 0.5f64..3.0,
        sources in prop::collection::vec(0.5f64..12.0, 10..40),
    ) {
        let engine = CalibrationEngine::new(CalibrationConfig::default(), &ReferenceData::default());
        let source: Vec<ActualPoints> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| ActualPoints::new(EntityId(i as u32 % 4), Role::Defender, i as u32, Some(*s)))
            .collect();
        let target: Vec<ActualPoints> = source
            .iter()
            .map(|a| ActualPoints { points: a.points.map(|p| p * k), ..*a })
            .collect();

        let result = engine.calibrate(&source, &target);
        prop_assert!(result.calibrated);
        prop_assert!((result.role_ratios[&Role::Defender].ratio - k).abs() < 1e-9);
        for entity in result.entity_ratios.values() {
            prop_assert!((entity.ratio - k).abs() < 1e-9);
        }
    }

    /// A pair with ratio 10 never moves any ratio
    #[test]
    fn prop_outlier_pair_ignored(
        ratios in prop::collection::vec(0.5f64..2.5, 10..30),
        outlier_entity in 0u32..3,
    ) {
        let engine = CalibrationEngine::new(CalibrationConfig::default(), &ReferenceData::default());
        let mut source: Vec<ActualPoints> = Vec::new();
        let mut target: Vec<ActualPoints> = Vec::new();
        for (i, r) in ratios.iter().enumerate() {
            let id = EntityId(i as u32 % 3);
            source.push(ActualPoints::new(id, Role::Forward, i as u32, Some(2.0)));
            target.push(ActualPoints::new(id, Role::Forward, i as u32, Some(2.0 * r)));
        }
        let clean = engine.calibrate(&source, &target);

        let period = ratios.len() as u32 + 1;
        source.push(ActualPoints::new(EntityId(outlier_entity), Role::Forward, period, Some(1.0)));
        target.push(ActualPoints::new(EntityId(outlier_entity), Role::Forward, period, Some(10.0)));
        let dirty = engine.calibrate(&source, &target);

        prop_assert_eq!(&clean.role_ratios, &dirty.role_ratios);
        prop_assert_eq!(&clean.entity_ratios, &dirty.entity_ratios);
        prop_assert_eq!(dirty.discarded.implausible, 1);
    }

    /// Beyond 30% apart the result falls back between average and baseline
    #[test]
    fn prop_disagreement_falls_back_toward_baseline(
        stat in 1.0f64..10.0,
        spread in 1.5f64..3.0,
        baseline_share in 0.3f64..0.95,
        stat_first in any::<bool>(),
    ) {
        let ml = stat * spread;
        let (a, b) = if stat_first { (stat, ml) } else { (ml, stat) };
        let average = (a + b) / 2.0;
        let baseline = average * baseline_share;

        let validator = ConsensusValidator::default();
        let result = validator.reconcile(Estimate::new(a, 70.0), Estimate::new(b, 60.0), baseline);

        prop_assert_eq!(result.agreement, AgreementTier::Disagreement);
        prop_assert!(result.points < average);
        prop_assert!(result.points > baseline);
        prop_assert!(result.confidence <= 40.0);
    }
}
