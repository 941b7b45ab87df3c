//! Startup rebuild of the identity state
//!
//! A rerun reconstructs exactly the state the previous run left behind by
//! scanning the target's persisted back references, post locations and
//! usernames. No separate transaction log is kept.

use super::locator::TopicLocator;
use super::map::IdentityMap;
use crate::adapters::target::TargetRepository;
use crate::domain::ids::{EntityType, LegacyId};
use crate::domain::Result;

/// Identity state rebuilt from the target
#[derive(Debug, Default)]
pub struct RebuiltIdentity {
    pub identity: IdentityMap,
    pub locator: TopicLocator,
}

/// Loads every persisted mapping, post location and username
///
/// Each table is read once with keyset pagination.
pub async fn rebuild(target: &dyn TargetRepository, page_size: usize) -> Result<RebuiltIdentity> {
    let page_size = page_size.max(1);
    let mut rebuilt = RebuiltIdentity::default();

    for entity_type in EntityType::ALL {
        let mut after: Option<LegacyId> = None;
        loop {
            let page = target
                .load_mappings(entity_type, after.as_ref(), page_size)
                .await?;
            for mapping in &page {
                rebuilt.identity.record_mapping(mapping);
            }
            if page.len() < page_size {
                break;
            }
            after = page.last().map(|mapping| mapping.legacy_id.clone());
        }
    }

    let mut after = None;
    loop {
        let page = target.load_post_locations(after, page_size).await?;
        let fetched = page.len();
        after = page.last().map(|location| location.post_id);
        for location in page {
            rebuilt.locator.record(location);
        }
        if fetched < page_size {
            break;
        }
    }

    let mut after = None;
    loop {
        let page = target.load_user_names(after, page_size).await?;
        for user in &page {
            let identity = &mut rebuilt.identity;
            identity.record_name(EntityType::User, &user.username, user.user_id);
            if let Some(legacy) = &user.legacy_username {
                identity.record_name(EntityType::User, legacy, user.user_id);
            }
            for alias in &user.aliases {
                identity.record_name(EntityType::User, alias, user.user_id);
            }
            identity.set_display_name(EntityType::User, user.user_id, &user.username);
        }
        if page.len() < page_size {
            break;
        }
        after = page.last().map(|user| user.user_id);
    }

    tracing::info!(
        mappings = rebuilt.identity.len(),
        post_locations = rebuilt.locator.len(),
        "Rebuilt identity map from target"
    );

    Ok(rebuilt)
}
