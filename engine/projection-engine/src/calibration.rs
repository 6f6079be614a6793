//! Empirical conversion-ratio calibration
//!
//! Pairs historical source-system and target-system actuals per entity and
//! period, drops blank and implausible pairs, and summarizes the surviving
//! target/source ratios per role (trimmed mean) and per entity (mean blended
//! toward the role ratio). Each pass yields a new immutable [`CalibrationResult`].

use crate::config::CalibrationConfig;
use crate::models::ConfidenceTier;
use crate::reference::ReferenceData;
use player_registry::{EntityId, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Realized points for one entity in one completed period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActualPoints {
    pub entity_id: EntityId,
    pub role: Role,
    pub period: u32,
    /// `None` when the feed has no figure for the period
    pub points: Option<f64>,
}

impl ActualPoints {
    pub fn new(entity_id: EntityId, role: Role, period: u32, points: Option<f64>) -> Self {
        Self { entity_id, role, period, points }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoleCalibration {
    pub ratio: f64,
    pub samples: usize,
    /// `false` when the ratio is the static fallback
    pub empirical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityCalibration {
    /// Raw mean blended toward the role ratio
    pub ratio: f64,
    pub raw_mean: f64,
    pub samples: usize,
    /// Weight given to `raw_mean`
    pub weight: f64,
}

/// Pairs that never reached a bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardCounts {
    /// Either side missing or not positive
    pub blank: usize,
    /// Ratio outside the plausible band
    pub implausible: usize,
    /// Observation with no counterpart in the other series
    pub unpaired: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationOrigin {
    Entity,
    Role,
    StaticFallback,
}

/// A ratio together with the level it was resolved at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRatio {
    pub ratio: f64,
    pub origin: CalibrationOrigin,
}

/// Output of one calibration pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Populated for every role
    pub role_ratios: BTreeMap<Role, RoleCalibration>,
    /// Only entities at or above the per-entity minimum
    pub entity_ratios: BTreeMap<EntityId, EntityCalibration>,
    pub total_samples: usize,
    pub confidence: ConfidenceTier,
    /// `false` when every ratio is the static fallback
    pub calibrated: bool,
    pub discarded: DiscardCounts,
}

impl CalibrationResult {
    /// A result carrying only static ratios
    pub fn static_fallback(static_ratios: &BTreeMap<Role, f64>) -> Self {
        let role_ratios = Role::ALL
            .iter()
            .map(|role| {
                let ratio = static_ratios.get(role).copied().unwrap_or(1.0);
                (*role, RoleCalibration { ratio, samples: 0, empirical: false })
            })
            .collect();
        Self {
            role_ratios,
            entity_ratios: BTreeMap::new(),
            total_samples: 0,
            confidence: ConfidenceTier::None,
            calibrated: false,
            discarded: DiscardCounts::default(),
        }
    }

    /// Entity ratio, else empirical role ratio, else static fallback
    pub fn ratio_for(&self, entity_id: EntityId, role: Role) -> ResolvedRatio {
        if let Some(entity) = self.entity_ratios.get(&entity_id) {
            return ResolvedRatio { ratio: entity.ratio, origin: CalibrationOrigin::Entity };
        }
        match self.role_ratios.get(&role) {
            Some(r) if r.empirical => {
                ResolvedRatio { ratio: r.ratio, origin: CalibrationOrigin::Role }
            }
            Some(r) => ResolvedRatio { ratio: r.ratio, origin: CalibrationOrigin::StaticFallback },
            None => ResolvedRatio { ratio: 1.0, origin: CalibrationOrigin::StaticFallback },
        }
    }

    /// Sample count behind a role ratio
    pub fn role_samples(&self, role: Role) -> usize {
        self.role_ratios.get(&role).map(|r| r.samples).unwrap_or(0)
    }
}

/// Calibration engine
pub struct CalibrationEngine {
    config: CalibrationConfig,
    static_ratios: BTreeMap<Role, f64>,
}

impl CalibrationEngine {
    pub fn new(config: CalibrationConfig, reference: &ReferenceData) -> Self {
        Self { config, static_ratios: reference.static_role_ratios() }
    }

    /// Compute empirical ratios from paired source/target actuals
    ///
    /// Both slices are expected to hold completed periods only.
    pub fn calibrate(
        &self,
        source_actuals: &[ActualPoints],
        target_actuals: &[ActualPoints],
    ) -> CalibrationResult {
        let mut discarded = DiscardCounts::default();

        // keyed and ordered so bucket contents never depend on input order
        let mut sources: BTreeMap<(EntityId, u32), ActualPoints> = BTreeMap::new();
        for obs in source_actuals {
            sources.entry((obs.entity_id, obs.period)).or_insert(*obs);
        }
        let mut targets: BTreeMap<(EntityId, u32), Option<f64>> = BTreeMap::new();
        for obs in target_actuals {
            targets.entry((obs.entity_id, obs.period)).or_insert(obs.points);
        }

        let mut role_buckets: BTreeMap<Role, Vec<f64>> = BTreeMap::new();
        let mut entity_buckets: BTreeMap<EntityId, (Role, Vec<f64>)> = BTreeMap::new();

        for (key, source) in &sources {
            let Some(target_points) = targets.remove(key) else {
                discarded.unpaired += 1;
                continue;
            };
            let (Some(s), Some(t)) = (positive(source.points), positive(target_points)) else {
                discarded.blank += 1;
                continue;
            };
            let ratio = t / s;
            if !(self.config.ratio_floor..=self.config.ratio_ceiling).contains(&ratio) {
                discarded.implausible += 1;
                continue;
            }
            role_buckets.entry(source.role).or_default().push(ratio);
            entity_buckets
                .entry(source.entity_id)
                .or_insert_with(|| (source.role, Vec::new()))
                .1
                .push(ratio);
        }
        discarded.unpaired += targets.len();

        let total_samples: usize = role_buckets.values().map(Vec::len).sum();

        if total_samples < self.config.min_total_samples {
            info!(
                "Calibration fell back to static ratios: {} samples (need {})",
                total_samples, self.config.min_total_samples
            );
            let mut result = CalibrationResult::static_fallback(&self.static_ratios);
            for (role, bucket) in &role_buckets {
                if let Some(entry) = result.role_ratios.get_mut(role) {
                    entry.samples = bucket.len();
                }
            }
            result.total_samples = total_samples;
            result.discarded = discarded;
            return result;
        }

        let role_ratios: BTreeMap<Role, RoleCalibration> = Role::ALL
            .iter()
            .map(|role| {
                let bucket = role_buckets.get(role).map(Vec::as_slice).unwrap_or(&[]);
                let calibration = if bucket.len() >= self.config.min_role_samples {
                    RoleCalibration {
                        ratio: trimmed_mean(bucket, self.config.trim_fraction),
                        samples: bucket.len(),
                        empirical: true,
                    }
                } else {
                    debug!("Role {} keeps static ratio: {} samples", role, bucket.len());
                    RoleCalibration {
                        ratio: self.static_ratio(*role),
                        samples: bucket.len(),
                        empirical: false,
                    }
                };
                (*role, calibration)
            })
            .collect();

        let entity_ratios: BTreeMap<EntityId, EntityCalibration> = entity_buckets
            .iter()
            .filter(|(_, (_, bucket))| bucket.len() >= self.config.min_entity_samples)
            .map(|(id, (role, bucket))| {
                let raw_mean = bucket.iter().sum::<f64>() / bucket.len() as f64;
                let weight =
                    (bucket.len() as f64 / self.config.entity_full_weight_samples).min(1.0);
                let role_ratio =
                    role_ratios.get(role).map(|r| r.ratio).unwrap_or_else(|| self.static_ratio(*role));
                let ratio = raw_mean * weight + role_ratio * (1.0 - weight);
                (*id, EntityCalibration { ratio, raw_mean, samples: bucket.len(), weight })
            })
            .collect();

        let confidence = if total_samples >= self.config.high_confidence_samples {
            ConfidenceTier::High
        } else if total_samples >= self.config.medium_confidence_samples {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        };

        info!(
            "📐 Calibration pass: {} samples, {} entity ratios, confidence {:?} (dropped {} blank, {} implausible, {} unpaired)",
            total_samples,
            entity_ratios.len(),
            confidence,
            discarded.blank,
            discarded.implausible,
            discarded.unpaired
        );

        CalibrationResult {
            role_ratios,
            entity_ratios,
            total_samples,
            confidence,
            calibrated: true,
            discarded,
        }
    }

    /// Calibrate on periods up to and including `last_completed_period`
    pub fn calibrate_completed(
        &self,
        source_actuals: &[ActualPoints],
        target_actuals: &[ActualPoints],
        last_completed_period: u32,
    ) -> CalibrationResult {
        let completed = |obs: &&ActualPoints| obs.period <= last_completed_period;
        let source: Vec<ActualPoints> = source_actuals.iter().filter(completed).copied().collect();
        let target: Vec<ActualPoints> = target_actuals.iter().filter(completed).copied().collect();
        self.calibrate(&source, &target)
    }

    /// Result used before any history exists
    pub fn static_result(&self) -> CalibrationResult {
        CalibrationResult::static_fallback(&self.static_ratios)
    }

    fn static_ratio(&self, role: Role) -> f64 {
        self.static_ratios.get(&role).copied().unwrap_or(1.0)
    }
}

fn positive(points: Option<f64>) -> Option<f64> {
    points.filter(|p| p.is_finite() && *p > 0.0)
}

/// Mean after dropping `floor(n * fraction)` values from each end
fn trimmed_mean(values: &[f64], fraction: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let trim = (sorted.len() as f64 * fraction).floor() as usize;
    let kept = &sorted[trim..sorted.len() - trim];
    if kept.is_empty() {
        return 1.0;
    }
    kept.iter().sum::<f64>() / kept.len() as f64
}
