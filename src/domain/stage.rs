//! Import stages and their fixed dependency order

use crate::domain::ids::EntityType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One ordered phase of the migration
///
/// Every stage imports a single entity type and may only reference entity
/// types of earlier stages through required foreign keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Groups,
    Users,
    Categories,
    Topics,
    Posts,
    Attachments,
    Likes,
    Subscriptions,
    PrivateMessages,
}

impl Stage {
    /// Dependency order, leaves first
    pub const ORDER: [Stage; 9] = [
        Stage::Groups,
        Stage::Users,
        Stage::Categories,
        Stage::Topics,
        Stage::Posts,
        Stage::Attachments,
        Stage::Likes,
        Stage::Subscriptions,
        Stage::PrivateMessages,
    ];

    /// Entity type produced by this stage
    pub fn entity_type(&self) -> EntityType {
        match self {
            Stage::Groups => EntityType::Group,
            Stage::Users => EntityType::User,
            Stage::Categories => EntityType::Category,
            Stage::Topics => EntityType::Topic,
            Stage::Posts => EntityType::Post,
            Stage::Attachments => EntityType::Attachment,
            Stage::Likes => EntityType::Like,
            Stage::Subscriptions => EntityType::Subscription,
            Stage::PrivateMessages => EntityType::PrivateMessage,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Groups => "groups",
            Stage::Users => "users",
            Stage::Categories => "categories",
            Stage::Topics => "topics",
            Stage::Posts => "posts",
            Stage::Attachments => "attachments",
            Stage::Likes => "likes",
            Stage::Subscriptions => "subscriptions",
            Stage::PrivateMessages => "private_messages",
        }
    }

    /// Restricts the fixed order to the selected stages
    ///
    /// An empty selection means every stage. The result is always in
    /// dependency order regardless of the order of `selected`.
    pub fn ordered_subset(selected: &[Stage]) -> Vec<Stage> {
        Stage::ORDER
            .iter()
            .copied()
            .filter(|stage| selected.is_empty() || selected.contains(stage))
            .collect()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Stage::ORDER
            .iter()
            .copied()
            .find(|stage| stage.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "Unknown stage '{s}'. Valid stages: {}",
                    Stage::ORDER.map(|stage| stage.as_str()).join(", ")
                )
            })
    }
}
