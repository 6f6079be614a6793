//! # Projection Engine
//!
//! Converts source-system point projections into calibrated target-system
//! projections.
//!
//! The engine is a set of pure, synchronous components sharing one explicit
//! [`ReferenceData`] value:
//!
//! - [`ArchetypeClassifier`] picks a static conversion ratio from an entity's
//!   role and display name.
//! - [`ScoreConverter`] applies the ratio and four adjustment factors, returning
//!   every multiplier with its evidence.
//! - [`CalibrationEngine`] learns empirical ratios from historical paired actuals.
//! - [`BiasCorrectionModel`] learns a multiplicative correction of the base
//!   conversion, producing the ML estimate.
//! - [`ConsensusValidator`] reconciles the statistical and ML estimates.
//! - [`ProjectionPipeline`] runs the above per entity across a roster.

pub mod archetype;
pub mod calibration;
pub mod config;
pub mod consensus;
pub mod converter;
pub mod correction;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod reference;

#[cfg(test)]
mod integration_tests;

pub use archetype::{ArchetypeClassifier, ArchetypeMatch};
pub use calibration::{
    ActualPoints, CalibrationEngine, CalibrationOrigin, CalibrationResult, DiscardCounts,
    EntityCalibration, ResolvedRatio, RoleCalibration,
};
pub use config::{
    CalibrationConfig, ConsensusConfig, ConverterConfig, CorrectionConfig, EngineConfig,
    MinutesBand,
};
pub use consensus::{AgreementTier, ConsensusBreakdown, ConsensusResult, ConsensusValidator};
pub use converter::{RatioSource, ScoreConverter};
pub use correction::{BiasCorrectionModel, Correction, CorrectionFeatures, CorrectionSample};
pub use error::{ProjectionError, Result};
pub use models::*;
pub use pipeline::{EntityInput, EntityProjection, ProjectionPipeline};
pub use reference::{ArchetypeProfile, ReferenceData};
