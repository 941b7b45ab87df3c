//! Target repository abstraction
//!
//! This module defines the traits a target platform must implement to
//! receive imported entities and to persist resumable cursors.

pub mod memory;
pub mod upload;
pub mod validation;

use crate::core::state::cursor::BatchCursor;
use crate::domain::entities::{
    CategoryAttrs, CreatedTopic, GroupAttrs, LikeAttrs, PostAttrs, PostRecord,
    PrivateMessageAttrs, SubscriptionAttrs, TopicAttrs, Upload, UserAttrs, UserName,
};
use crate::domain::errors::TargetError;
use crate::domain::ids::{EntityType, LegacyId, TargetId};
use crate::domain::mapping::{EntityMapping, PostLocation};
use crate::domain::stage::Stage;
use crate::domain::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

pub use memory::MemoryTarget;

/// Result type for target operations
pub type TargetResult<T> = std::result::Result<T, TargetError>;

/// Canonical entity store of the target platform
///
/// Every `create_*` call persists the entity together with its legacy back
/// reference in a single transaction, so a back reference exists only for
/// completely persisted entities. `TargetError::Validation` signals that the
/// attributes were rejected; every other error is transient I/O.
#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn create_group(&self, attrs: &GroupAttrs) -> TargetResult<TargetId>;

    async fn create_user(&self, attrs: &UserAttrs) -> TargetResult<TargetId>;

    async fn create_category(&self, attrs: &CategoryAttrs) -> TargetResult<TargetId>;

    /// Creates a topic and its first post
    ///
    /// When `first_post_legacy_id` is set, a post back reference for the
    /// first post is persisted in the same transaction.
    async fn create_topic(&self, attrs: &TopicAttrs) -> TargetResult<CreatedTopic>;

    async fn create_post(&self, attrs: &PostAttrs) -> TargetResult<PostLocation>;

    async fn create_like(&self, attrs: &LikeAttrs) -> TargetResult<TargetId>;

    async fn create_subscription(&self, attrs: &SubscriptionAttrs) -> TargetResult<TargetId>;

    /// Creates a private message post, starting a conversation unless
    /// `reply_to` names an earlier message
    async fn create_private_message(
        &self,
        attrs: &PrivateMessageAttrs,
    ) -> TargetResult<PostLocation>;

    /// Target id persisted for a legacy entity, if any
    async fn find_by_legacy_id(
        &self,
        entity_type: EntityType,
        legacy_id: &LegacyId,
    ) -> TargetResult<Option<TargetId>>;

    /// User owning an email address, compared case-insensitively
    async fn find_user_by_email(&self, email: &str) -> TargetResult<Option<TargetId>>;

    /// Persists an additional back reference for an existing entity
    ///
    /// Recording a reference that already exists is a no-op.
    async fn record_legacy_reference(&self, mapping: &EntityMapping) -> TargetResult<()>;

    /// Persists an extra legacy name a user can be referenced by
    ///
    /// Used when a legacy account is merged into an existing user. Recording
    /// an alias twice is a no-op.
    async fn record_user_alias(&self, user_id: TargetId, alias: &str) -> TargetResult<()>;

    /// Page of back references of one entity type with a legacy id greater
    /// than `after`, ordered by legacy id
    async fn load_mappings(
        &self,
        entity_type: EntityType,
        after: Option<&LegacyId>,
        limit: usize,
    ) -> TargetResult<Vec<EntityMapping>>;

    /// Page of post locations with a post id greater than `after`, ordered by id
    async fn load_post_locations(
        &self,
        after: Option<TargetId>,
        limit: usize,
    ) -> TargetResult<Vec<PostLocation>>;

    /// Page of usernames and aliases with a user id greater than `after`,
    /// ordered by id
    async fn load_user_names(
        &self,
        after: Option<TargetId>,
        limit: usize,
    ) -> TargetResult<Vec<UserName>>;

    async fn find_post(&self, post_id: TargetId) -> TargetResult<Option<PostRecord>>;

    /// Page of posts with an id greater than `after`, ordered by id
    async fn scan_posts(
        &self,
        after: Option<TargetId>,
        limit: usize,
    ) -> TargetResult<Vec<PostRecord>>;

    async fn update_post_raw(&self, post_id: TargetId, raw: &str) -> TargetResult<()>;

    /// Copies a file into upload storage
    ///
    /// Returns `None` when the file does not exist.
    async fn store_upload(
        &self,
        owner_id: TargetId,
        path: &Path,
        filename: &str,
    ) -> TargetResult<Option<Upload>>;

    async fn find_upload(&self, upload_id: TargetId) -> TargetResult<Option<Upload>>;

    /// Markup embedding an upload in post content
    fn render_reference_markup(&self, upload: &Upload) -> String {
        if upload.is_image() {
            format!("![{}]({})", upload.original_filename, upload.url)
        } else {
            format!(
                "[{}|attachment]({}) ({})",
                upload.original_filename,
                upload.url,
                human_size(upload.filesize)
            )
        }
    }

    async fn tag_topic(&self, topic_id: TargetId, tags: &[String]) -> TargetResult<()>;

    /// Redirects a legacy URL path to an imported entity
    async fn register_permalink(
        &self,
        path: &str,
        entity_type: EntityType,
        target_id: TargetId,
    ) -> TargetResult<()>;

    async fn set_user_avatar(&self, user_id: TargetId, upload_id: TargetId) -> TargetResult<()>;

    async fn add_group_member(&self, group_id: TargetId, user_id: TargetId) -> TargetResult<()>;

    /// Number of persisted entities per type
    async fn entity_counts(&self) -> TargetResult<BTreeMap<EntityType, u64>>;
}

/// Persistence for stage cursors
#[async_trait]
pub trait CursorStorage: Send + Sync {
    async fn load_cursor(&self, stage: Stage) -> Result<Option<BatchCursor>>;

    /// Creates or replaces the cursor of its stage
    async fn save_cursor(&self, cursor: &BatchCursor) -> Result<()>;

    async fn load_all_cursors(&self) -> Result<Vec<BatchCursor>>;
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, "0 B")]
    #[test_case(1023, "1023 B")]
    #[test_case(1536, "1.5 KB")]
    #[test_case(5 * 1024 * 1024, "5.0 MB")]
    fn test_human_size(bytes: u64, expected: &str) {
        assert_eq!(human_size(bytes), expected);
    }
}
