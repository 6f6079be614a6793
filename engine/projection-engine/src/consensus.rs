use crate::config::ConsensusConfig;
use crate::models::{ConfidenceTier, Estimate};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How closely the statistical and ML estimates agree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgreementTier {
    Strong,
    Moderate,
    Weak,
    Disagreement,
}

/// Inputs and intermediate values behind a consensus projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusBreakdown {
    pub statistical: Estimate,
    pub ml: Estimate,
    pub average: f64,
    pub difference: f64,
    /// `difference / average`, 0 when the average is 0
    pub disagreement: f64,
    pub baseline: f64,
    /// Projection before the outlier guard
    pub blended: f64,
    pub outlier_capped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub points: f64,
    /// 0-100
    pub confidence: f64,
    pub agreement: AgreementTier,
    pub breakdown: ConsensusBreakdown,
}

/// Reconciles a statistical estimate with an ML-corrected one
#[derive(Debug, Clone)]
pub struct ConsensusValidator {
    config: ConsensusConfig,
}

impl ConsensusValidator {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }

    /// Numeric confidence for a converter label
    pub fn label_score(&self, tier: ConfidenceTier) -> f64 {
        match tier {
            ConfidenceTier::High => self.config.high_label_score,
            ConfidenceTier::Medium => self.config.medium_label_score,
            ConfidenceTier::Low => self.config.low_label_score,
            ConfidenceTier::None => self.config.none_label_score,
        }
    }

    pub fn classify(&self, disagreement: f64) -> AgreementTier {
        if disagreement <= self.config.strong_threshold {
            AgreementTier::Strong
        } else if disagreement <= self.config.moderate_threshold {
            AgreementTier::Moderate
        } else if disagreement <= self.config.weak_threshold {
            AgreementTier::Weak
        } else {
            AgreementTier::Disagreement
        }
    }

    /// Blend two estimates, falling back toward `baseline` as they diverge
    pub fn reconcile(&self, statistical: Estimate, ml: Estimate, baseline: f64) -> ConsensusResult {
        let stat_points = finite_or_zero(statistical.points);
        let ml_points = finite_or_zero(ml.points);
        let baseline = finite_or_zero(baseline);

        let average = (stat_points + ml_points) / 2.0;
        let difference = (stat_points - ml_points).abs();
        let disagreement = if average.abs() < f64::EPSILON { 0.0 } else { difference / average.abs() };
        let agreement = self.classify(disagreement);

        let (blended, adjustment) = match agreement {
            AgreementTier::Strong => (average, self.config.strong_bonus),
            AgreementTier::Moderate => (average, self.config.moderate_bonus),
            AgreementTier::Weak => (
                blend(average, baseline, self.config.weak_average_weight),
                -self.config.weak_penalty,
            ),
            AgreementTier::Disagreement => (
                blend(average, baseline, self.config.disagreement_average_weight),
                -self.config.disagreement_penalty,
            ),
        };

        let mut confidence = finite_or_zero(statistical.confidence)
            .min(finite_or_zero(ml.confidence))
            + adjustment;
        let mut points = blended;
        let mut outlier_capped = false;

        if baseline > 0.0 && points > self.config.outlier_trigger * baseline {
            debug!(
                "Consensus {:.2} exceeds {}x baseline {:.2}; capping",
                points, self.config.outlier_trigger, baseline
            );
            points = self.config.outlier_cap * baseline;
            confidence -= self.config.outlier_penalty;
            outlier_capped = true;
        }

        ConsensusResult {
            points: points.max(0.0),
            confidence: confidence.clamp(0.0, 100.0),
            agreement,
            breakdown: ConsensusBreakdown {
                statistical,
                ml,
                average,
                difference,
                disagreement,
                baseline,
                blended,
                outlier_capped,
            },
        }
    }
}

impl Default for ConsensusValidator {
    fn default() -> Self {
        Self::new(ConsensusConfig::default())
    }
}

fn blend(average: f64, baseline: f64, average_weight: f64) -> f64 {
    average * average_weight + baseline * (1.0 - average_weight)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconcile(stat: f64, ml: f64, baseline: f64) -> ConsensusResult {
        ConsensusValidator::default().reconcile(Estimate::new(stat, 70.0), Estimate::new(ml, 60.0), baseline)
    }

    #[test]
    fn test_strong_agreement_uses_average() {
        let result = reconcile(5.0, 5.2, 4.0);
        assert_eq!(result.agreement, AgreementTier::Strong);
        assert!((result.points - 5.1).abs() < 1e-9);
        assert_eq!(result.confidence, 75.0);
    }

    #[test]
    fn test_moderate_agreement() {
        // average 5.0, difference 0.8 -> 16%
        let result = reconcile(4.6, 5.4, 4.0);
        assert_eq!(result.agreement, AgreementTier::Moderate);
        assert!((result.points - 5.0).abs() < 1e-9);
        assert_eq!(result.confidence, 65.0);
    }

    #[test]
    fn test_weak_agreement_blends_toward_baseline() {
        // average 5.0, difference 1.25 -> 25%
        let result = reconcile(4.375, 5.625, 4.0);
        assert_eq!(result.agreement, AgreementTier::Weak);
        assert!((result.points - (5.0 * 0.7 + 4.0 * 0.3)).abs() < 1e-9);
        assert_eq!(result.confidence, 55.0);
    }

    #[test]
    fn test_disagreement_lands_between_average_and_baseline() {
        let result = reconcile(3.0, 7.0, 4.0);
        assert_eq!(result.agreement, AgreementTier::Disagreement);
        assert!((result.points - 4.5).abs() < 1e-9);
        assert!(result.points < result.breakdown.average);
        assert!(result.points > result.breakdown.baseline);
        assert_eq!(result.confidence, 40.0);
    }

    #[test]
    fn test_zero_average_has_no_disagreement() {
        let result = reconcile(0.0, 0.0, 2.0);
        assert_eq!(result.breakdown.disagreement, 0.0);
        assert_eq!(result.agreement, AgreementTier::Strong);
        assert_eq!(result.points, 0.0);
    }

    #[test]
    fn test_outlier_capped_against_baseline() {
        let result = reconcile(10.0, 10.4, 2.0);
        assert!(result.breakdown.outlier_capped);
        assert!((result.points - 5.0).abs() < 1e-9);
        // 60 + 15 - 15
        assert_eq!(result.confidence, 60.0);
    }

    #[test]
    fn test_confidence_clamped() {
        let validator = ConsensusValidator::default();
        let high = validator.reconcile(Estimate::new(5.0, 100.0), Estimate::new(5.0, 95.0), 5.0);
        assert_eq!(high.confidence, 100.0);

        let low = validator.reconcile(Estimate::new(1.0, 10.0), Estimate::new(9.0, 5.0), 4.0);
        assert_eq!(low.confidence, 0.0);
    }

    #[test]
    fn test_never_negative() {
        let result = reconcile(-4.0, -3.0, -1.0);
        assert!(result.points >= 0.0);
    }

    #[test]
    fn test_non_finite_inputs_treated_as_zero() {
        let result = reconcile(f64::NAN, 4.0, 4.0);
        assert!(result.breakdown.statistical.points.is_nan());
        assert_eq!(result.agreement, AgreementTier::Disagreement);
        assert!(result.points.is_finite());
    }

    #[test]
    fn test_label_scores() {
        let validator = ConsensusValidator::default();
        assert_eq!(validator.label_score(ConfidenceTier::High), 85.0);
        assert_eq!(validator.label_score(ConfidenceTier::None), 0.0);
    }
}
