//! Domain identifier types with validation
//!
//! Legacy identifiers come from the source dataset and are kept as strings so
//! that integer, composite and textual primary keys share one representation.
//! Target identifiers are the integer primary keys assigned by the target
//! platform.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of entity tracked by the identity map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// User group
    Group,
    /// User account
    User,
    /// Forum category
    Category,
    /// Topic (thread)
    Topic,
    /// Post (reply or first post)
    Post,
    /// Uploaded file attached to a post
    Attachment,
    /// Like on a post
    Like,
    /// Topic subscription
    Subscription,
    /// Private message post
    PrivateMessage,
}

impl EntityType {
    /// All entity types in stage order
    pub const ALL: [EntityType; 9] = [
        EntityType::Group,
        EntityType::User,
        EntityType::Category,
        EntityType::Topic,
        EntityType::Post,
        EntityType::Attachment,
        EntityType::Like,
        EntityType::Subscription,
        EntityType::PrivateMessage,
    ];

    /// Stable name used in persisted back references
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Group => "group",
            EntityType::User => "user",
            EntityType::Category => "category",
            EntityType::Topic => "topic",
            EntityType::Post => "post",
            EntityType::Attachment => "attachment",
            EntityType::Like => "like",
            EntityType::Subscription => "subscription",
            EntityType::PrivateMessage => "private_message",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown entity type: {s}"))
    }
}

/// Legacy identifier newtype wrapper
///
/// Primary key value from the source dataset.
///
/// # Examples
///
/// ```
/// use ferry::domain::ids::LegacyId;
///
/// let id = LegacyId::from(1234);
/// assert_eq!(id.as_str(), "1234");
/// assert!(LegacyId::new("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegacyId(String);

impl LegacyId {
    /// Creates a new LegacyId, rejecting blank values
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err("Legacy ID cannot be empty".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the legacy ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<i64> for LegacyId {
    fn from(key: i64) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for LegacyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LegacyId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for LegacyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Target identifier newtype wrapper
///
/// Canonical primary key assigned by the target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(i64);

impl TargetId {
    /// Wraps a raw target key
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw key
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for TargetId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
