use crate::normalization::{normalize_name, normalize_projections, RawProjection};
use crate::types::{Entity, EntityId, Ownership, ProjectionSeries, RegistryError, Role};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{info, warn};

/// Raw projection rows for one entity inside a roster snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct EntityProjectionRows {
    pub entity_id: EntityId,
    #[serde(default)]
    pub projections: Vec<RawProjection>,
}

/// Roster snapshot as delivered by the ingestion feed
#[derive(Debug, Clone, Deserialize)]
pub struct RosterSnapshot {
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub projections: Vec<EntityProjectionRows>,
}

/// Player Registry - the roster of entities and their projection series
///
/// Entities are keyed by id; a normalized-name index supports the fuzzy
/// lookups used when matching reference data against display names.
#[derive(Debug, Clone, Default)]
pub struct PlayerRegistry {
    /// Entities ordered by id so iteration is deterministic
    entities_by_id: BTreeMap<EntityId, Entity>,

    /// Normalized display name -> entity id
    ids_by_name: HashMap<String, EntityId>,

    /// Canonical projection series per entity
    projections: HashMap<EntityId, ProjectionSeries>,
}

impl PlayerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a snapshot, normalizing every projection row
    pub fn from_snapshot(snapshot: RosterSnapshot) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for entity in snapshot.entities {
            registry.insert_entity(entity)?;
        }

        for rows in snapshot.projections {
            let normalized = normalize_projections(rows.entity_id, rows.projections);
            registry.attach_projections(normalized.series)?;
        }

        info!(
            "Loaded {} entities ({} with projections)",
            registry.len(),
            registry.projections.len()
        );
        Ok(registry)
    }

    /// Parse a JSON roster snapshot
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let snapshot: RosterSnapshot = serde_json::from_str(json)?;
        Self::from_snapshot(snapshot)
    }

    /// Load a JSON roster snapshot from disk
    pub fn load_from_file<P: AsRef<Path>>(file_path: P) -> Result<Self, RegistryError> {
        info!("Loading roster snapshot from: {:?}", file_path.as_ref());
        let json = std::fs::read_to_string(&file_path)
            .map_err(|e| RegistryError::Parse(format!("{:?}: {e}", file_path.as_ref())))?;
        Self::from_json_str(&json)
    }

    /// Register an entity; ids must be unique
    pub fn insert_entity(&mut self, entity: Entity) -> Result<(), RegistryError> {
        if self.entities_by_id.contains_key(&entity.id) {
            return Err(RegistryError::DuplicateEntity(entity.id));
        }

        let key = normalize_name(&entity.name);
        if let Some(existing) = self.ids_by_name.get(&key) {
            warn!("Name '{}' shared by entities {} and {}", entity.name, existing, entity.id);
        } else {
            self.ids_by_name.insert(key, entity.id);
        }

        self.entities_by_id.insert(entity.id, entity);
        Ok(())
    }

    /// Attach (or replace) the projection series of a registered entity
    pub fn attach_projections(&mut self, series: ProjectionSeries) -> Result<(), RegistryError> {
        let entity_id = series.entity_id();
        if !self.entities_by_id.contains_key(&entity_id) {
            return Err(RegistryError::EntityNotFound(entity_id));
        }
        self.projections.insert(entity_id, series);
        Ok(())
    }

    /// Get an entity by id
    pub fn get(&self, id: EntityId) -> Result<&Entity, RegistryError> {
        self.entities_by_id.get(&id).ok_or(RegistryError::EntityNotFound(id))
    }

    /// Get an entity by display name (case and punctuation insensitive)
    pub fn get_by_name(&self, name: &str) -> Option<&Entity> {
        self.ids_by_name.get(&normalize_name(name)).and_then(|id| self.entities_by_id.get(id))
    }

    /// Projection series for an entity; an entity without rows gets an empty series
    pub fn projections_for(&self, id: EntityId) -> ProjectionSeries {
        self.projections.get(&id).cloned().unwrap_or_else(|| ProjectionSeries::empty(id))
    }

    /// All entities in id order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities_by_id.values()
    }

    /// Entities playing a given role
    pub fn entities_by_role(&self, role: Role) -> Vec<&Entity> {
        self.entities_by_id.values().filter(|e| e.role == role).collect()
    }

    /// Entities owned by the requesting manager
    pub fn owned_by_self(&self) -> Vec<&Entity> {
        self.entities_by_id.values().filter(|e| e.ownership == Ownership::OwnedBySelf).collect()
    }

    /// Search by partial normalized name
    pub fn search(&self, query: &str) -> Vec<&Entity> {
        let needle = normalize_name(query);
        self.entities_by_id
            .values()
            .filter(|e| normalize_name(&e.name).contains(&needle))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entities_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities_by_id.is_empty()
    }
}
