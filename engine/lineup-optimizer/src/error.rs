//! Error types for the lineup optimizer

use player_registry::EntityId;
use thiserror::Error;

/// Result type for optimizer operations
pub type Result<T> = std::result::Result<T, OptimizerError>;

/// Caller contract violations
///
/// An infeasible formation is not an error; it is reported as an invalid
/// [`crate::LineupResult`] with its shortfalls.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizerError {
    #[error("Entity {entity_id} has no resolved projection")]
    MissingProjection { entity_id: EntityId },

    #[error("Entity {0} appears more than once in the roster")]
    DuplicateEntity(EntityId),

    #[error("Current lineup references entity {0} which is not in the roster")]
    UnknownEntity(EntityId),

    #[error("Entity {0} is listed twice in the current lineup")]
    DuplicateStarter(EntityId),

    #[error("Current lineup {formation} ({starters} starters) matches no formation template")]
    IllegalLineup { formation: String, starters: usize },
}
