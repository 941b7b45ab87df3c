//! Identity map records and post locations

use crate::domain::ids::{EntityType, LegacyId, TargetId};
use serde::{Deserialize, Serialize};

/// Mapping from a legacy entity to its canonical target id
///
/// At most one mapping exists per `(entity_type, legacy_id)`. A mapping is
/// created once the entity is durably persisted and never repointed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityMapping {
    pub entity_type: EntityType,
    pub legacy_id: LegacyId,
    pub target_id: TargetId,
}

impl EntityMapping {
    pub fn new(entity_type: EntityType, legacy_id: LegacyId, target_id: TargetId) -> Self {
        Self {
            entity_type,
            legacy_id,
            target_id,
        }
    }
}

/// Where a persisted post lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostLocation {
    pub post_id: TargetId,
    pub topic_id: TargetId,
    /// Author of the post
    pub user_id: TargetId,
    /// 1-based position inside the topic
    pub post_number: i32,
    /// Canonical URL of the post
    pub url: String,
}
