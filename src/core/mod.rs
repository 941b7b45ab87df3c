//! Core migration logic for ferry.
//!
//! # Modules
//!
//! - [`identity`] - legacy to target id mapping and its startup rebuild
//! - [`import`] - entity importers, batch driver, hooks and run coordination
//! - [`resolve`] - two-pass rewriting of in-content references
//! - [`state`] - resumable stage cursors
//! - [`transform`] - markup rewrite pipeline
//!
//! # Import Workflow
//!
//! 1. **Rebuild**: load persisted mappings, post locations and usernames from the target
//! 2. **Stages**: for every stage in dependency order, page through the source
//! 3. **Rows**: resolve foreign keys, transform content, persist, record the mapping, run hooks
//! 4. **Checkpoint**: save the stage cursor after every page
//! 5. **Global pass**: re-scan persisted posts and rewrite forward references
//! 6. **Report**: log the import summary
//!
//! # Example
//!
//! ```rust,no_run
//! use ferry::config::load_config;
//! use ferry::core::import::MigrationCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("ferry.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let coordinator = MigrationCoordinator::from_config(&config, shutdown_rx).await?;
//! let summary = coordinator.execute().await?;
//!
//! println!("Imported: {}", summary.total_imported());
//! println!("Skipped: {}", summary.total_skipped());
//! # Ok(())
//! # }
//! ```

pub mod identity;
pub mod import;
pub mod resolve;
pub mod state;
pub mod transform;
