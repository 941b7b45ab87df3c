//! Canonical attributes handed to the target repository
//!
//! Foreign keys are already resolved to target ids. Each attribute struct
//! carries the legacy id of its row so the target can persist the back
//! reference in the same transaction as the entity.

use crate::domain::ids::{LegacyId, TargetId};
use crate::domain::mapping::PostLocation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAttrs {
    pub legacy_id: LegacyId,
    pub name: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAttrs {
    pub legacy_id: LegacyId,
    /// Normalised target username
    pub username: String,
    /// Username as it appeared in the legacy dataset
    pub legacy_username: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAttrs {
    pub legacy_id: LegacyId,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<TargetId>,
    pub position: Option<i64>,
}

/// A topic together with its first post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicAttrs {
    pub legacy_id: LegacyId,
    pub title: String,
    pub category_id: TargetId,
    pub user_id: TargetId,
    /// Transformed body of the first post
    pub raw: String,
    /// Legacy post id of the first post when the source stores it separately
    pub first_post_legacy_id: Option<LegacyId>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostAttrs {
    pub legacy_id: LegacyId,
    pub topic_id: TargetId,
    pub user_id: TargetId,
    pub raw: String,
    pub reply_to_post_number: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeAttrs {
    pub legacy_id: LegacyId,
    pub post_id: TargetId,
    pub user_id: TargetId,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionAttrs {
    pub legacy_id: LegacyId,
    pub topic_id: TargetId,
    pub user_id: TargetId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessageAttrs {
    pub legacy_id: LegacyId,
    pub title: String,
    pub user_id: TargetId,
    pub recipient_ids: Vec<TargetId>,
    pub raw: String,
    /// Post id of an earlier message whose conversation this one continues
    pub reply_to: Option<TargetId>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Result of creating a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedTopic {
    pub topic_id: TargetId,
    pub first_post: PostLocation,
}

/// Stored upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub id: TargetId,
    pub owner_id: TargetId,
    pub original_filename: String,
    /// Hex SHA-256 of the file content
    pub sha256: String,
    pub filesize: u64,
    pub url: String,
}

impl Upload {
    /// Whether the original filename looks like an image
    pub fn is_image(&self) -> bool {
        let lower = self.original_filename.to_lowercase();
        [".png", ".jpg", ".jpeg", ".gif", ".webp", ".bmp", ".svg"]
            .iter()
            .any(|ext| lower.ends_with(ext))
    }
}

/// Persisted post content as seen by the global resolution pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub post_id: TargetId,
    pub raw: String,
}

/// Names of a user used to rebuild the name index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserName {
    pub user_id: TargetId,
    pub username: String,
    pub legacy_username: Option<String>,
    /// Legacy names of accounts merged into this user, oldest first
    #[serde(default)]
    pub aliases: Vec<String>,
}
