//! Ingestion boundary: turns loosely shaped feed rows into canonical projections
//!
//! Upstream feeds disagree on field names ("gw" vs "event", "xP" vs
//! "predicted_points", ...). Everything is resolved here once so the rest of
//! the engine only ever sees [`PeriodProjection`].

use crate::types::{EntityId, PeriodProjection, ProjectionSeries, Provenance};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A single projection row as it arrives from a feed
#[derive(Debug, Clone, Deserialize)]
pub struct RawProjection {
    #[serde(alias = "gw", alias = "gameweek", alias = "event", alias = "round")]
    pub period: i64,

    #[serde(
        default,
        alias = "predicted_points",
        alias = "expected_points",
        alias = "xP",
        alias = "pts"
    )]
    pub points: Option<f64>,

    #[serde(default, alias = "predicted_minutes", alias = "xmins", alias = "mins")]
    pub minutes: Option<f64>,

    #[serde(default, alias = "opp", alias = "opponent_team")]
    pub opponent: Option<String>,

    #[serde(default, alias = "fdr", alias = "fixture_difficulty")]
    pub difficulty: Option<i64>,

    #[serde(default, alias = "kind", alias = "source")]
    pub provenance: Option<String>,
}

/// Counters describing what the adapter had to repair or drop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationStats {
    pub accepted: usize,
    pub negative_period: usize,
    pub duplicate_period: usize,
    pub non_finite_values: usize,
}

/// Canonical series plus the repair counters
#[derive(Debug, Clone)]
pub struct Normalized {
    pub series: ProjectionSeries,
    pub stats: NormalizationStats,
}

/// Normalize raw feed rows for one entity into a [`ProjectionSeries`]
///
/// Rows with a negative period are dropped. When two rows share a period a
/// realized result wins over a projection; otherwise the first row is kept.
pub fn normalize_projections(entity_id: EntityId, rows: Vec<RawProjection>) -> Normalized {
    let mut stats = NormalizationStats::default();
    let mut by_period: BTreeMap<u32, PeriodProjection> = BTreeMap::new();

    for row in rows {
        let Ok(period) = u32::try_from(row.period) else {
            stats.negative_period += 1;
            warn!("Dropping projection for entity {} with invalid period {}", entity_id, row.period);
            continue;
        };

        let points = finite_or_none(row.points, &mut stats);
        let minutes = finite_or_none(row.minutes, &mut stats).filter(|m| *m >= 0.0);
        let difficulty = row.difficulty.and_then(|d| u8::try_from(d).ok()).filter(|d| (1..=5).contains(d));
        let provenance = parse_provenance(row.provenance.as_deref());

        let projection = PeriodProjection {
            period,
            points,
            minutes,
            opponent: row.opponent.filter(|o| !o.trim().is_empty()),
            difficulty,
            provenance,
        };

        match by_period.get(&period) {
            Some(existing)
                if existing.provenance == Provenance::Projection
                    && projection.provenance == Provenance::Result =>
            {
                stats.duplicate_period += 1;
                by_period.insert(period, projection);
            }
            Some(_) => {
                stats.duplicate_period += 1;
                debug!("Ignoring duplicate row for entity {} period {}", entity_id, period);
            }
            None => {
                by_period.insert(period, projection);
            }
        }
    }

    stats.accepted = by_period.len();
    if stats.duplicate_period > 0 {
        warn!(
            "Entity {} had {} duplicated period rows at ingestion",
            entity_id, stats.duplicate_period
        );
    }

    let series = ProjectionSeries::new(entity_id, by_period.into_values().collect())
        .unwrap_or_else(|_| ProjectionSeries::empty(entity_id));

    Normalized { series, stats }
}

/// Lowercase, strip punctuation, and collapse whitespace for name matching
///
/// "N'Golo Kanté" becomes "ngolo kanté"; "Heung-Min  Son" becomes "heung min son".
pub fn normalize_name(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for ch in input.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_space = true;
        }
        // other punctuation (apostrophes, dots) is dropped without a break
    }
    out
}

fn finite_or_none(value: Option<f64>, stats: &mut NormalizationStats) -> Option<f64> {
    match value {
        Some(v) if v.is_finite() => Some(v),
        Some(_) => {
            stats.non_finite_values += 1;
            None
        }
        None => None,
    }
}

fn parse_provenance(raw: Option<&str>) -> Provenance {
    match raw.map(|s| s.trim().to_ascii_lowercase()) {
        Some(s) if matches!(s.as_str(), "result" | "actual" | "final" | "realized") => {
            Provenance::Result
        }
        _ => Provenance::Projection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(json: &str) -> Vec<RawProjection> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_alias_field_names() {
        let raw = rows(
            r#"[
                {"gw": 1, "xP": 4.5, "xmins": 88, "opp": "CHE (H)", "fdr": 4},
                {"event": 2, "predicted_points": 3.1, "predicted_minutes": 70},
                {"period": 3, "points": 6.0, "kind": "result"}
            ]"#,
        );
        let normalized = normalize_projections(EntityId(10), raw);
        let series = normalized.series;

        assert_eq!(series.len(), 3);
        let gw1 = series.get(1).unwrap();
        assert_eq!(gw1.points, Some(4.5));
        assert_eq!(gw1.minutes, Some(88.0));
        assert_eq!(gw1.opponent.as_deref(), Some("CHE (H)"));
        assert_eq!(gw1.difficulty, Some(4));
        assert_eq!(series.get(3).unwrap().provenance, Provenance::Result);
        assert_eq!(normalized.stats.accepted, 3);
    }

    #[test]
    fn test_missing_points_stay_missing() {
        let raw = rows(r#"[{"gw": 5, "xmins": 0}]"#);
        let normalized = normalize_projections(EntityId(1), raw);
        let gw5 = normalized.series.get(5).unwrap();
        assert_eq!(gw5.points, None);
        assert_eq!(gw5.minutes, Some(0.0));
    }

    #[test]
    fn test_negative_period_dropped() {
        let raw = rows(r#"[{"gw": -1, "xP": 2.0}, {"gw": 0, "xP": 1.0}]"#);
        let normalized = normalize_projections(EntityId(1), raw);
        assert_eq!(normalized.series.len(), 1);
        assert_eq!(normalized.stats.negative_period, 1);
    }

    #[test]
    fn test_duplicate_prefers_result() {
        let raw = rows(
            r#"[
                {"gw": 4, "xP": 5.0},
                {"gw": 4, "xP": 2.0, "kind": "actual"},
                {"gw": 4, "xP": 9.0}
            ]"#,
        );
        let normalized = normalize_projections(EntityId(1), raw);
        let gw4 = normalized.series.get(4).unwrap();
        assert_eq!(gw4.points, Some(2.0));
        assert_eq!(gw4.provenance, Provenance::Result);
        assert_eq!(normalized.stats.duplicate_period, 2);
    }

    #[test]
    fn test_out_of_range_difficulty_discarded() {
        let raw = rows(r#"[{"gw": 1, "fdr": 9}, {"gw": 2, "fdr": -2}]"#);
        let series = normalize_projections(EntityId(1), raw).series;
        assert!(series.iter().all(|p| p.difficulty.is_none()));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("N'Golo Kanté"), "ngolo kanté");
        assert_eq!(normalize_name("  Heung-Min   Son "), "heung min son");
        assert_eq!(normalize_name("M. Salah"), "m salah");
        assert_eq!(normalize_name("..."), "");
    }
}
