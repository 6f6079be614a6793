//! Player Registry - roster entities and their canonical projections
//!
//! This crate owns the data model shared by the projection engine and the
//! lineup optimizer: entities, roles, period projections, and the ingestion
//! adapter that normalizes loosely shaped feed rows.

pub mod normalization;
pub mod registry;
pub mod types;

pub use normalization::{normalize_name, normalize_projections, NormalizationStats, RawProjection};
pub use registry::{EntityProjectionRows, PlayerRegistry, RosterSnapshot};
pub use types::{
    Entity, EntityId, Ownership, PeriodProjection, ProjectionSeries, Provenance, RegistryError,
    Role,
};
