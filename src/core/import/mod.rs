//! Import orchestration
//!
//! This module provides the resumable import of a legacy forum:
//! - Entity importers for every stage
//! - Page-by-page batch driving with stage cursors
//! - Post-commit hooks
//! - Run coordination and summary reporting

pub mod coordinator;
pub mod driver;
pub mod hooks;
pub mod importer;
pub mod summary;

pub use crate::domain::stage::Stage;
pub use coordinator::{CoordinatorOptions, MigrationCoordinator};
pub use driver::{BatchDriver, DriverOptions};
pub use hooks::{
    normalize_permalink, AvatarHook, CommittedEntity, GroupMembershipHook, HookContext,
    HookRegistry, PermalinkHook, PostCommitHook, TagHook,
};
pub use importer::{
    foreign_keys, normalize_username, EntityImporter, ForeignKey, ForeignKeyPolicy, ImportOptions,
    RowOutcome, RunState,
};
pub use summary::{ImportSummary, StageSummary};
