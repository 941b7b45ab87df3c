//! Identity map
//!
//! Maps `(entity type, legacy id)` to the canonical target id. The map is
//! owned by a single migration run, rebuilt from the target's persisted back
//! references at startup and passed by reference into every importer and
//! resolver call.

use crate::domain::ids::{EntityType, LegacyId, TargetId};
use crate::domain::mapping::EntityMapping;
use std::collections::HashMap;

/// Mapping from legacy identities to target ids
///
/// # Collision policy
///
/// The first mapping recorded for a key wins; later calls to
/// [`record`](Self::record) for the same key are no-ops.
///
/// # Examples
///
/// ```
/// use ferry::core::identity::IdentityMap;
/// use ferry::domain::{EntityType, LegacyId, TargetId};
///
/// let mut map = IdentityMap::new();
/// assert!(map.record(EntityType::User, LegacyId::from(1), TargetId::new(10)));
/// assert!(!map.record(EntityType::User, LegacyId::from(1), TargetId::new(99)));
/// assert_eq!(map.lookup(EntityType::User, &LegacyId::from(1)), Some(TargetId::new(10)));
/// ```
#[derive(Debug, Default, Clone)]
pub struct IdentityMap {
    mappings: HashMap<(EntityType, LegacyId), TargetId>,
    natural_keys: HashMap<(EntityType, String), TargetId>,
    names: HashMap<(EntityType, String), Vec<TargetId>>,
    display_names: HashMap<(EntityType, TargetId), String>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a mapping, returning `false` when the key was already mapped
    pub fn record(&mut self, entity_type: EntityType, legacy_id: LegacyId, target_id: TargetId) -> bool {
        use std::collections::hash_map::Entry;

        match self.mappings.entry((entity_type, legacy_id)) {
            Entry::Occupied(existing) => {
                if *existing.get() != target_id {
                    tracing::debug!(
                        entity_type = %entity_type,
                        legacy_id = %existing.key().1,
                        existing = %existing.get(),
                        ignored = %target_id,
                        "Mapping already recorded, keeping first"
                    );
                }
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(target_id);
                true
            }
        }
    }

    /// Records a mapping value
    pub fn record_mapping(&mut self, mapping: &EntityMapping) -> bool {
        self.record(
            mapping.entity_type,
            mapping.legacy_id.clone(),
            mapping.target_id,
        )
    }

    pub fn lookup(&self, entity_type: EntityType, legacy_id: &LegacyId) -> Option<TargetId> {
        self.mappings
            .get(&(entity_type, legacy_id.clone()))
            .copied()
    }

    pub fn exists(&self, entity_type: EntityType, legacy_id: &LegacyId) -> bool {
        self.lookup(entity_type, legacy_id).is_some()
    }

    /// Whether every id in `legacy_ids` is mapped
    pub fn all_mapped<'a, I>(&self, entity_type: EntityType, legacy_ids: I) -> bool
    where
        I: IntoIterator<Item = &'a LegacyId>,
    {
        legacy_ids
            .into_iter()
            .all(|legacy_id| self.exists(entity_type, legacy_id))
    }

    /// Records a natural key such as a lowercased email
    ///
    /// First write wins, like legacy id mappings.
    pub fn record_natural_key(&mut self, entity_type: EntityType, key: &str, target_id: TargetId) {
        self.natural_keys
            .entry((entity_type, key.to_string()))
            .or_insert(target_id);
    }

    pub fn lookup_natural_key(&self, entity_type: EntityType, key: &str) -> Option<TargetId> {
        self.natural_keys
            .get(&(entity_type, key.to_string()))
            .copied()
    }

    /// Indexes a legacy name for name based resolution
    ///
    /// Names are matched case-insensitively. Recording the same target again
    /// moves it to the most recent position.
    pub fn record_name(&mut self, entity_type: EntityType, name: &str, target_id: TargetId) {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return;
        }
        let candidates = self.names.entry((entity_type, key)).or_default();
        candidates.retain(|existing| *existing != target_id);
        candidates.push(target_id);
    }

    /// Resolves a legacy name to the most recently recorded candidate
    pub fn resolve_name(&self, entity_type: EntityType, name: &str) -> Option<TargetId> {
        self.names
            .get(&(entity_type, name.trim().to_lowercase()))
            .and_then(|candidates| candidates.last())
            .copied()
    }

    /// Stores the target display name of an entity
    pub fn set_display_name(&mut self, entity_type: EntityType, target_id: TargetId, name: &str) {
        self.display_names
            .insert((entity_type, target_id), name.to_string());
    }

    pub fn display_name(&self, entity_type: EntityType, target_id: TargetId) -> Option<&str> {
        self.display_names
            .get(&(entity_type, target_id))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// Natural key of a user email
pub fn email_key(email: &str) -> Option<String> {
    let key = email.trim().to_lowercase();
    (!key.is_empty() && key.contains('@')).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: i64) -> LegacyId {
        LegacyId::from(n)
    }

    #[test]
    fn test_record_first_write_wins() {
        let mut map = IdentityMap::new();
        assert!(map.record(EntityType::Post, id(20), TargetId::new(1)));
        assert!(!map.record(EntityType::Post, id(20), TargetId::new(2)));
        assert_eq!(map.lookup(EntityType::Post, &id(20)), Some(TargetId::new(1)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_keys_are_scoped_by_entity_type() {
        let mut map = IdentityMap::new();
        map.record(EntityType::Topic, id(10), TargetId::new(5));
        assert!(map.exists(EntityType::Topic, &id(10)));
        assert!(!map.exists(EntityType::Post, &id(10)));
    }

    #[test]
    fn test_all_mapped() {
        let mut map = IdentityMap::new();
        map.record(EntityType::User, id(1), TargetId::new(1));
        map.record(EntityType::User, id(2), TargetId::new(2));
        assert!(map.all_mapped(EntityType::User, &[id(1), id(2)]));
        assert!(!map.all_mapped(EntityType::User, &[id(1), id(3)]));
    }

    #[test]
    fn test_name_resolution_prefers_most_recent() {
        let mut map = IdentityMap::new();
        map.record_name(EntityType::User, "Alice", TargetId::new(1));
        map.record_name(EntityType::User, "alice", TargetId::new(2));
        assert_eq!(map.resolve_name(EntityType::User, "ALICE"), Some(TargetId::new(2)));

        map.record_name(EntityType::User, "alice", TargetId::new(1));
        assert_eq!(map.resolve_name(EntityType::User, "alice"), Some(TargetId::new(1)));
        assert_eq!(map.resolve_name(EntityType::User, " bob "), None);
    }

    #[test]
    fn test_natural_key_first_write_wins() {
        let mut map = IdentityMap::new();
        map.record_natural_key(EntityType::User, "a@x.com", TargetId::new(1));
        map.record_natural_key(EntityType::User, "a@x.com", TargetId::new(2));
        assert_eq!(
            map.lookup_natural_key(EntityType::User, "a@x.com"),
            Some(TargetId::new(1))
        );
    }

    #[test]
    fn test_email_key_normalises() {
        assert_eq!(email_key(" A@X.com "), Some("a@x.com".to_string()));
        assert_eq!(email_key("not-an-email"), None);
        assert_eq!(email_key(""), None);
    }
}
