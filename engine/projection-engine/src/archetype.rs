use crate::models::ArchetypeSource;
use crate::reference::ReferenceData;
use player_registry::{normalize_name, Entity};
use serde::Serialize;
use tracing::trace;

/// Result of matching an entity against the archetype tables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchetypeMatch {
    pub name: String,
    pub ratio: f64,
    pub source: ArchetypeSource,
}

/// Maps an entity to its behavioral archetype and static conversion ratio
#[derive(Debug, Clone, Copy)]
pub struct ArchetypeClassifier<'a> {
    reference: &'a ReferenceData,
}

impl<'a> ArchetypeClassifier<'a> {
    pub fn new(reference: &'a ReferenceData) -> Self {
        Self { reference }
    }

    /// Classify an entity by role and display name
    pub fn classify(&self, entity: &Entity) -> ArchetypeMatch {
        let role_archetypes = self.reference.archetypes.get(&entity.role);
        let position_default = self.reference.position_default(entity.role);

        if role_archetypes.is_none() && position_default.is_none() {
            return ArchetypeMatch {
                name: format!("{} (unmapped)", entity.role),
                ratio: self.reference.fallback_ratio,
                source: ArchetypeSource::PositionFallback,
            };
        }

        let key = normalize_name(&entity.name);
        if !key.is_empty() {
            let matched = role_archetypes.into_iter().flatten().find(|profile| {
                profile.members.iter().any(|member| names_match(&key, &normalize_name(member)))
            });
            if let Some(profile) = matched {
                trace!("Entity {} matched archetype {}", entity.id, profile.name);
                return ArchetypeMatch {
                    name: profile.name.clone(),
                    ratio: profile.ratio,
                    source: ArchetypeSource::ArchetypeMapping,
                };
            }
        }

        match position_default {
            Some(ratio) => ArchetypeMatch {
                name: format!("{} default", entity.role),
                ratio,
                source: ArchetypeSource::PositionDefault,
            },
            None => ArchetypeMatch {
                name: format!("{} (unmapped)", entity.role),
                ratio: self.reference.fallback_ratio,
                source: ArchetypeSource::PositionFallback,
            },
        }
    }
}

/// Exact match, or containment either way ("Alisson" vs "Alisson Becker")
fn names_match(entity_key: &str, member_key: &str) -> bool {
    if member_key.is_empty() {
        return false;
    }
    entity_key == member_key || entity_key.contains(member_key) || member_key.contains(entity_key)
}
