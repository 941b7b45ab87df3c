//! Domain models and types for Ferry.
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`EntityType`], [`LegacyId`], [`TargetId`])
//! - **Stages** ([`Stage`]) in their fixed dependency order
//! - **Source rows** ([`SourceRow`]) and canonical attribute structs
//! - **Error types** ([`MigrationError`], [`SourceError`], [`TargetError`], [`RowIssue`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Legacy ids and target ids are distinct types, so a legacy key can never
//! be handed to the target by mistake:
//!
//! ```rust
//! use ferry::domain::{LegacyId, TargetId};
//!
//! let legacy = LegacyId::from(1234);
//! let target = TargetId::new(7);
//! // let wrong: TargetId = legacy;  // Compile error!
//! assert_eq!(legacy.as_str(), "1234");
//! assert_eq!(target.get(), 7);
//! ```

pub mod entities;
pub mod errors;
pub mod ids;
pub mod mapping;
pub mod result;
pub mod row;
pub mod stage;

// Re-export commonly used types for convenience
pub use entities::{
    CategoryAttrs, CreatedTopic, GroupAttrs, LikeAttrs, PostAttrs, PostRecord,
    PrivateMessageAttrs, SubscriptionAttrs, TopicAttrs, Upload, UserAttrs, UserName,
};
pub use errors::{MigrationError, RowIssue, RowIssueKind, SourceError, TargetError};
pub use ids::{EntityType, LegacyId, TargetId};
pub use mapping::{EntityMapping, PostLocation};
pub use result::Result;
pub use row::SourceRow;
pub use stage::Stage;
