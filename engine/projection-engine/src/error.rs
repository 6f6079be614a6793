//! Error types for the projection engine

use player_registry::EntityId;
use thiserror::Error;

/// Result type for projection engine operations
pub type Result<T> = std::result::Result<T, ProjectionError>;

/// Caller contract violations
///
/// Missing or sparse data never surfaces here: it degrades to neutral
/// factors tagged in the returned breakdown instead.
#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("No target period supplied for entity {entity_id}")]
    MissingTargetPeriod { entity_id: EntityId },

    #[error("Projection series for entity {series} passed for entity {entity}")]
    SeriesMismatch { entity: EntityId, series: EntityId },

    #[error("Reference data error: {0}")]
    ReferenceData(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}
