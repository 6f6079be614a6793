//! # Lineup Optimizer
//!
//! Selects the highest-scoring legal lineup from a roster across a fixed set
//! of formation templates, and compares a current lineup against it.
//!
//! Each call is a pure function of roster, templates and current lineup.
//! Templates are evaluated independently across the rayon pool.

pub mod error;
pub mod formation;
pub mod optimizer;
pub mod recommendation;

pub use error::{OptimizerError, Result};
pub use formation::{formation_label, FormationTemplate, LINEUP_SIZE};
pub use optimizer::{
    build_pools, evaluate_template, CurrentLineup, LineupAssessment, LineupOptimizer,
    LineupResult, OptimizationReport, OptimizerConfig, RolePools, RosterSlot, SelectedEntity,
    Shortfall,
};
pub use recommendation::{rank_recommendations, swap_recommendations, Recommendation};

/// Default minimum point gain for a recommendation
pub const DEFAULT_MATERIALITY_THRESHOLD: f64 = 0.5;
