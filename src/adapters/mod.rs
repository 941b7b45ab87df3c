//! External system integrations for ferry.
//!
//! - [`source`] - the [`SourceAdapter`](source::SourceAdapter) trait and an in-memory source
//! - [`target`] - the [`TargetRepository`](target::TargetRepository) and
//!   [`CursorStorage`](target::CursorStorage) traits and an in-memory target
//! - [`postgresql`] - PostgreSQL source and target
//! - [`factory`] - builds the configured adapters
//!
//! The engine only talks to the traits, so an in-memory pair drives the
//! whole import in tests.

pub mod factory;
pub mod postgresql;
pub mod source;
pub mod target;
