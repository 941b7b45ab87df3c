//! Run-scoped identity state
//!
//! - [`map`] - `(entity type, legacy id)` to target id mapping
//! - [`locator`] - post id to topic, post number and URL
//! - [`loader`] - rebuild of both from persisted target data

pub mod loader;
pub mod locator;
pub mod map;

pub use loader::{rebuild, RebuiltIdentity};
pub use locator::TopicLocator;
pub use map::{email_key, IdentityMap};
