//! Source-to-target score conversion
//!
//! The converter multiplies a baseline source-system projection by five
//! factors, always in the same order:
//!
//! 1. base ratio (archetype or calibration derived)
//! 2. form momentum
//! 3. fixture-run quality
//! 4. injury-return adjustment
//! 5. playing-time confidence
//!
//! Each factor degrades to 1.0 on its own when its inputs are missing; the
//! breakdown records why.

use crate::archetype::ArchetypeClassifier;
use crate::calibration::{CalibrationOrigin, CalibrationResult};
use crate::config::ConverterConfig;
use crate::error::{ProjectionError, Result};
use crate::models::{
    ConfidenceTier, ConvertedProjection, FactorBreakdown, FactorStatus, FixtureFactor, FormFactor,
    InjuryFactor, InjuryState, MinutesSource, PlayingTimeFactor, RatioFactor, RatioOrigin,
    SourceSummary,
};
use player_registry::{Entity, ProjectionSeries};
use tracing::debug;

/// Which ratio the base conversion step uses
#[derive(Debug, Clone, Copy)]
pub enum RatioSource<'a> {
    /// Static archetype / position ratio
    Archetype,
    /// Empirical ratios, falling back to the archetype ratio where the pass has none
    Calibrated(&'a CalibrationResult),
}

/// Status codes some feeds use instead of free text
const INJURED_STATUS_CODES: [&str; 5] = ["i", "s", "u", "injured", "suspended"];

/// Score converter
pub struct ScoreConverter<'a> {
    config: &'a ConverterConfig,
    classifier: ArchetypeClassifier<'a>,
}

impl<'a> ScoreConverter<'a> {
    pub fn new(config: &'a ConverterConfig, classifier: ArchetypeClassifier<'a>) -> Self {
        Self { config, classifier }
    }

    /// Convert an entity's source projections into a calibrated target projection
    ///
    /// Only a missing target period or a series belonging to another entity is
    /// an error.
    pub fn convert(
        &self,
        entity: &Entity,
        series: &ProjectionSeries,
        target_period: Option<u32>,
        ratio_source: RatioSource<'_>,
    ) -> Result<ConvertedProjection> {
        let target_period = target_period
            .ok_or(ProjectionError::MissingTargetPeriod { entity_id: entity.id })?;
        if series.entity_id() != entity.id {
            return Err(ProjectionError::SeriesMismatch {
                entity: entity.id,
                series: series.entity_id(),
            });
        }

        let source = summarize_source(series, target_period);
        let ratio = self.resolve_ratio(entity, ratio_source);
        let form = self.form_momentum(series, target_period, source.season_average);
        let fixture = self.fixture_run(series, target_period, source.season_average);
        let injury = self.injury_adjustment(entity, series, target_period);
        let playing_time = self.playing_time(series, target_period);

        let combined = ratio.value
            * form.multiplier
            * fixture.multiplier
            * injury.multiplier
            * playing_time.multiplier;
        let apply = |points: f64| (points * combined).max(0.0);
        let confidence = self.confidence_label(&source);

        debug!(
            "Converted entity {} for period {}: ratio {:.3}, form {:.3}, fixture {:.3}, injury {:.2}, minutes {:.2} -> x{:.3}",
            entity.id,
            target_period,
            ratio.value,
            form.multiplier,
            fixture.multiplier,
            injury.multiplier,
            playing_time.multiplier,
            combined
        );

        Ok(ConvertedProjection {
            entity_id: entity.id,
            role: entity.role,
            target_period,
            season_total: apply(source.season_total),
            season_average: apply(source.season_average),
            target_period_points: source.target_period_points.map(apply),
            confidence,
            source,
            factors: FactorBreakdown { ratio, form, fixture, injury, playing_time, combined },
        })
    }

    fn resolve_ratio(&self, entity: &Entity, ratio_source: RatioSource<'_>) -> RatioFactor {
        if let RatioSource::Calibrated(calibration) = ratio_source {
            let resolved = calibration.ratio_for(entity.id, entity.role);
            match resolved.origin {
                CalibrationOrigin::Entity => {
                    return RatioFactor {
                        value: resolved.ratio,
                        origin: RatioOrigin::CalibratedEntity,
                        archetype: None,
                    };
                }
                CalibrationOrigin::Role => {
                    return RatioFactor {
                        value: resolved.ratio,
                        origin: RatioOrigin::CalibratedRole,
                        archetype: None,
                    };
                }
                CalibrationOrigin::StaticFallback => {}
            }
        }

        let matched = self.classifier.classify(entity);
        RatioFactor {
            value: matched.ratio,
            origin: RatioOrigin::Archetype(matched.source),
            archetype: Some(matched.name),
        }
    }

    fn form_momentum(
        &self,
        series: &ProjectionSeries,
        target_period: u32,
        season_average: f64,
    ) -> FormFactor {
        let recent: Vec<f64> = series
            .before(target_period)
            .iter()
            .rev()
            .filter_map(|p| p.points.filter(|v| v.is_finite()))
            .take(self.config.form_window)
            .collect();
        let recent_average = mean(&recent);

        if recent.len() < self.config.form_min_periods || season_average <= 0.0 {
            debug!("Form momentum neutral: {} recent periods", recent.len());
            return FormFactor {
                multiplier: 1.0,
                recent_average,
                season_average,
                periods_used: recent.len(),
                status: FactorStatus::InsufficientData,
            };
        }

        let ratio = recent_average.unwrap_or(season_average) / season_average;
        FormFactor {
            multiplier: ratio.clamp(self.config.form_floor, self.config.form_ceiling),
            recent_average,
            season_average,
            periods_used: recent.len(),
            status: FactorStatus::Applied,
        }
    }

    fn fixture_run(
        &self,
        series: &ProjectionSeries,
        target_period: u32,
        season_average: f64,
    ) -> FixtureFactor {
        let upcoming: Vec<f64> = series
            .from_period(target_period)
            .iter()
            .filter_map(|p| p.points.filter(|v| v.is_finite()))
            .take(self.config.fixture_window)
            .collect();
        let upcoming_average = mean(&upcoming);

        if upcoming.len() < self.config.fixture_min_periods || season_average <= 0.0 {
            debug!("Fixture run neutral: {} upcoming periods", upcoming.len());
            return FixtureFactor {
                multiplier: 1.0,
                upcoming_average,
                season_average,
                periods_used: upcoming.len(),
                status: FactorStatus::InsufficientData,
            };
        }

        let ratio = upcoming_average.unwrap_or(season_average) / season_average;
        FixtureFactor {
            multiplier: ratio.clamp(self.config.fixture_floor, self.config.fixture_ceiling),
            upcoming_average,
            season_average,
            periods_used: upcoming.len(),
            status: FactorStatus::Applied,
        }
    }

    fn injury_adjustment(
        &self,
        entity: &Entity,
        series: &ProjectionSeries,
        target_period: u32,
    ) -> InjuryFactor {
        let text = [entity.status.as_deref(), entity.news.as_deref()]
            .into_iter()
            .flatten()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");

        let coded_injury = entity
            .status
            .as_deref()
            .map(|s| INJURED_STATUS_CODES.contains(&s.trim().to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        let injury_signal = coded_injury || any_keyword(&text, &self.config.injury_keywords);
        let cleared = strip_phrases(&text, &self.config.negated_return_keywords);
        let return_signal = any_keyword(&cleared, &self.config.return_keywords);

        // most recent first
        let low_minute_periods: Vec<u32> = series
            .before(target_period)
            .iter()
            .rev()
            .take(self.config.recovery_lookback)
            .filter(|p| p.minutes.is_some_and(|m| m < self.config.low_minutes_threshold))
            .map(|p| p.period)
            .collect();

        // a coded injury only yields to a return backed by low-minute appearances
        let recovering = return_signal && !low_minute_periods.is_empty();
        let (state, multiplier) = if recovering {
            let last_low = low_minute_periods[0];
            let since = target_period.saturating_sub(last_low + 1);
            let table = &self.config.recovery_multipliers;
            let multiplier = table
                .get((since as usize).min(table.len().saturating_sub(1)))
                .copied()
                .unwrap_or(1.0);
            (InjuryState::Recovering { periods_since_low_minutes: since }, multiplier)
        } else if coded_injury || (injury_signal && !return_signal) {
            (InjuryState::Injured, self.config.injured_multiplier)
        } else {
            (InjuryState::Available, 1.0)
        };

        if state != InjuryState::Available {
            debug!("Entity {} injury state {:?} -> x{:.2}", entity.id, state, multiplier);
        }

        InjuryFactor {
            multiplier,
            state,
            injury_signal,
            return_signal,
            low_minute_periods: low_minute_periods.len(),
        }
    }

    fn playing_time(&self, series: &ProjectionSeries, target_period: u32) -> PlayingTimeFactor {
        let target_minutes = series
            .get(target_period)
            .and_then(|p| p.minutes)
            .filter(|m| m.is_finite() && *m >= 0.0);

        let (resolved_minutes, source) = match target_minutes {
            Some(minutes) => (minutes, MinutesSource::TargetPeriod),
            None => {
                let known: Vec<f64> = series.known_minutes().filter(|m| *m >= 0.0).collect();
                match mean(&known) {
                    Some(avg) => (avg, MinutesSource::SeasonMean),
                    None => (self.config.default_minutes, MinutesSource::Default),
                }
            }
        };

        let multiplier = match source {
            MinutesSource::Default => self.config.no_minutes_multiplier,
            _ => self.band_multiplier(resolved_minutes),
        };

        PlayingTimeFactor { multiplier, resolved_minutes, source }
    }

    fn band_multiplier(&self, minutes: f64) -> f64 {
        let bands = &self.config.minutes_bands;
        bands
            .iter()
            .filter(|band| minutes >= band.min_minutes)
            .max_by(|a, b| a.min_minutes.total_cmp(&b.min_minutes))
            .or_else(|| bands.iter().min_by(|a, b| a.min_minutes.total_cmp(&b.min_minutes)))
            .map(|band| band.multiplier)
            .unwrap_or(1.0)
    }

    fn confidence_label(&self, source: &SourceSummary) -> ConfidenceTier {
        if source.season_total.abs() < f64::EPSILON {
            ConfidenceTier::None
        } else if source.periods_with_data >= self.config.high_confidence_periods {
            ConfidenceTier::High
        } else if source.periods_with_data >= self.config.medium_confidence_periods {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

fn summarize_source(series: &ProjectionSeries, target_period: u32) -> SourceSummary {
    let (season_total, periods_with_data) =
        series.known_points().fold((0.0, 0usize), |(sum, n), points| (sum + points, n + 1));
    let season_average =
        if periods_with_data > 0 { season_total / periods_with_data as f64 } else { 0.0 };

    SourceSummary {
        season_total,
        season_average,
        target_period_points: series
            .get(target_period)
            .and_then(|p| p.points)
            .filter(|v| v.is_finite()),
        periods_with_data,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn strip_phrases(text: &str, phrases: &[String]) -> String {
    phrases
        .iter()
        .map(|phrase| phrase.to_lowercase())
        .filter(|phrase| !phrase.is_empty())
        .fold(text.to_string(), |acc, phrase| acc.replace(phrase.as_str(), " "))
}

fn any_keyword(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|keyword| contains_keyword(text, keyword))
}

/// Keyword match anchored at a word start ("available" does not hit "unavailable")
fn contains_keyword(text: &str, keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    if keyword.is_empty() {
        return false;
    }
    text.match_indices(keyword.as_str())
        .any(|(idx, _)| text[..idx].chars().next_back().map_or(true, |c| !c.is_alphanumeric()))
}
