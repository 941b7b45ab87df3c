// Ferry - Resumable Legacy Forum Migration
// Copyright (c) 2025 Ferry Contributors
// Licensed under the MIT License

//! # Ferry - Resumable Legacy Forum Migration
//!
//! Ferry migrates legacy forum datasets (groups, users, categories, topics,
//! posts, attachments, likes, subscriptions, private messages) into a
//! normalized target platform. Referential integrity is preserved even
//! though content references entities that are imported later, and every
//! run can be interrupted and resumed without creating duplicates.
//!
//! ## Overview
//!
//! - **Identity map** from `(entity type, legacy id)` to target ids,
//!   persisted next to every created entity and rebuilt at startup
//! - **Batch driver** walking each stage in key order with resumable cursors
//! - **Entity importers** that translate source rows, resolve foreign keys
//!   and create-or-skip target entities
//! - **Content transform pipeline** rewriting legacy markup
//! - **Reference resolver** rewriting quotes, links and mentions at import
//!   time and again in a global pass once every post exists
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (identity, import, resolve, transform, state)
//! - [`adapters`] - Source and target integrations (PostgreSQL, in-memory)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferry::config::load_config;
//! use ferry::core::import::MigrationCoordinator;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("ferry.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//!     let coordinator = MigrationCoordinator::from_config(&config, shutdown_rx).await?;
//!     let summary = coordinator.execute().await?;
//!
//!     println!("Imported {} entities", summary.total_imported());
//!     Ok(())
//! }
//! ```
//!
//! ## Content Transformation
//!
//! ```rust
//! use ferry::core::transform::{build_pipeline, Dialect};
//!
//! let pipeline = build_pipeline(Dialect::Bbcode, None).unwrap();
//! assert_eq!(pipeline.apply("[b]bold[/b]"), "**bold**");
//! ```
//!
//! ## Error Handling
//!
//! Fatal errors use [`domain::MigrationError`]. Rows that cannot be imported
//! never fail a run; they are reported as [`domain::RowIssue`]s in the
//! import summary.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
