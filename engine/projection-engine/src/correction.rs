//! Bias-correction model for converted projections
//!
//! Learns, per role, how far realized target points tend to land from the
//! converted projection given the converter's own evidence (form,
//! fixture run, expected minutes). The model regresses `ln(actual / predicted)`
//! on standardized features with an L2-regularized linear fit, so its output
//! is a multiplicative correction.

use crate::config::CorrectionConfig;
use crate::models::{ConvertedProjection, Estimate, FactorBreakdown};
use player_registry::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const FEATURE_COUNT: usize = 3;

const FULL_MATCH_MINUTES: f64 = 90.0;

/// Converter evidence fed to the correction model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionFeatures {
    pub form: f64,
    pub fixture: f64,
    /// Resolved minutes as a share of a full match
    pub minutes_share: f64,
}

impl CorrectionFeatures {
    pub fn from_breakdown(factors: &FactorBreakdown) -> Self {
        Self {
            form: factors.form.multiplier,
            fixture: factors.fixture.multiplier,
            minutes_share: factors.playing_time.resolved_minutes / FULL_MATCH_MINUTES,
        }
    }

    fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [self.form, self.fixture, self.minutes_share]
    }
}

/// One historical observation: what the converter predicted and what happened
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionSample {
    pub role: Role,
    pub features: CorrectionFeatures,
    /// Converter target-period points with every factor applied
    pub predicted: f64,
    /// Realized target-system points
    pub actual: f64,
}

/// Fitted coefficients for one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleModel {
    pub intercept: f64,
    pub weights: [f64; FEATURE_COUNT],
    pub means: [f64; FEATURE_COUNT],
    pub stds: [f64; FEATURE_COUNT],
    pub samples: usize,
}

impl RoleModel {
    fn log_multiplier(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let z = standardize(x, &self.means, &self.stds);
        self.intercept + dot(&self.weights, &z)
    }
}

/// Multiplier and confidence produced for one prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub multiplier: f64,
    /// 0-100
    pub confidence: f64,
    pub trained: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasCorrectionModel {
    config: CorrectionConfig,
    roles: BTreeMap<Role, RoleModel>,
}

impl BiasCorrectionModel {
    /// Identity model: multiplier 1.0 for every role
    pub fn untrained(config: CorrectionConfig) -> Self {
        Self { config, roles: BTreeMap::new() }
    }

    /// Fit one model per role that has enough usable samples
    pub fn fit(config: CorrectionConfig, samples: &[CorrectionSample]) -> Self {
        let mut by_role: BTreeMap<Role, Vec<([f64; FEATURE_COUNT], f64)>> = BTreeMap::new();
        for sample in samples {
            if !(sample.predicted > 0.0 && sample.actual > 0.0) {
                continue;
            }
            let x = sample.features.as_array();
            if x.iter().any(|v| !v.is_finite()) {
                continue;
            }
            by_role
                .entry(sample.role)
                .or_default()
                .push((x, (sample.actual / sample.predicted).ln()));
        }

        let mut roles = BTreeMap::new();
        for (role, rows) in by_role {
            if rows.len() < config.min_samples {
                debug!("No correction for {}: {} usable samples", role, rows.len());
                continue;
            }
            let model = fit_role(&config, &rows);
            debug!(
                "Correction for {}: intercept {:.4}, weights {:?} ({} samples)",
                role, model.intercept, model.weights, model.samples
            );
            roles.insert(role, model);
        }

        info!("🧮 Bias correction fitted for {} of {} roles", roles.len(), Role::ALL.len());
        Self { config, roles }
    }

    pub fn is_trained(&self, role: Role) -> bool {
        self.roles.contains_key(&role)
    }

    pub fn role_model(&self, role: Role) -> Option<&RoleModel> {
        self.roles.get(&role)
    }

    pub fn predict(&self, role: Role, features: &CorrectionFeatures) -> Correction {
        let Some(model) = self.roles.get(&role) else {
            return Correction {
                multiplier: 1.0,
                confidence: self.config.untrained_confidence,
                trained: false,
            };
        };

        let x = features.as_array();
        let raw = if x.iter().all(|v| v.is_finite()) { model.log_multiplier(&x).exp() } else { 1.0 };
        let multiplier = raw.clamp(self.config.multiplier_floor, self.config.multiplier_ceiling);

        let coverage =
            (model.samples as f64 / self.config.full_confidence_samples.max(1) as f64).min(1.0);
        let confidence = self.config.min_confidence
            + (self.config.max_confidence - self.config.min_confidence) * coverage;

        Correction { multiplier, confidence, trained: true }
    }

    /// ML estimate for a converted projection: calibrated points x correction
    ///
    /// `None` when the role has no fitted model or the target period has no points.
    pub fn estimate(&self, converted: &ConvertedProjection) -> Option<Estimate> {
        if !self.is_trained(converted.role) {
            return None;
        }
        let points = converted.target_period_points?;
        let correction =
            self.predict(converted.role, &CorrectionFeatures::from_breakdown(&converted.factors));
        Some(Estimate::new(points * correction.multiplier, correction.confidence))
    }
}

fn fit_role(config: &CorrectionConfig, rows: &[([f64; FEATURE_COUNT], f64)]) -> RoleModel {
    let n = rows.len() as f64;
    let (means, stds) = feature_norm_stats(rows);
    let z_rows: Vec<([f64; FEATURE_COUNT], f64)> =
        rows.iter().map(|(x, y)| (standardize(x, &means, &stds), *y)).collect();

    let mut intercept = rows.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut weights = [0.0; FEATURE_COUNT];

    for _ in 0..config.iterations {
        let mut grad_b = 0.0;
        let mut grad_w = [0.0; FEATURE_COUNT];
        for (z, y) in &z_rows {
            let residual = intercept + dot(&weights, z) - y;
            grad_b += residual;
            for j in 0..FEATURE_COUNT {
                grad_w[j] += residual * z[j];
            }
        }
        intercept -= config.learning_rate * grad_b / n;
        for j in 0..FEATURE_COUNT {
            let g = grad_w[j] / n + config.l2 * weights[j];
            weights[j] -= config.learning_rate * g;
        }
    }

    RoleModel { intercept, weights, means, stds, samples: rows.len() }
}

fn feature_norm_stats(
    rows: &[([f64; FEATURE_COUNT], f64)],
) -> ([f64; FEATURE_COUNT], [f64; FEATURE_COUNT]) {
    let n = rows.len().max(1) as f64;
    let mut mean = [0.0; FEATURE_COUNT];
    for (x, _) in rows {
        for i in 0..FEATURE_COUNT {
            mean[i] += x[i];
        }
    }
    for v in &mut mean {
        *v /= n;
    }

    let mut std = [0.0; FEATURE_COUNT];
    for (x, _) in rows {
        for i in 0..FEATURE_COUNT {
            let d = x[i] - mean[i];
            std[i] += d * d;
        }
    }
    for v in &mut std {
        *v = (*v / n).sqrt().max(1e-6);
    }
    (mean, std)
}

fn standardize(
    x: &[f64; FEATURE_COUNT],
    mean: &[f64; FEATURE_COUNT],
    std: &[f64; FEATURE_COUNT],
) -> [f64; FEATURE_COUNT] {
    let mut z = [0.0; FEATURE_COUNT];
    for i in 0..FEATURE_COUNT {
        z[i] = (x[i] - mean[i]) / std[i].max(1e-6);
    }
    z
}

fn dot(a: &[f64; FEATURE_COUNT], b: &[f64; FEATURE_COUNT]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
