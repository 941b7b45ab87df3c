//! Migration coordinator - main orchestrator of an import run
//!
//! A run rebuilds the identity state from the target, drives every selected
//! stage in dependency order, then re-scans persisted posts to resolve the
//! references that pointed forward at import time.

use super::driver::{BatchDriver, DriverOptions};
use super::hooks::HookRegistry;
use super::importer::{EntityImporter, ImportOptions, RunState};
use super::summary::ImportSummary;
use crate::adapters::factory::{create_source, create_target};
use crate::adapters::source::SourceAdapter;
use crate::adapters::target::{CursorStorage, TargetRepository};
use crate::config::FerryConfig;
use crate::core::identity::rebuild;
use crate::core::resolve::ResolveContext;
use crate::core::state::CursorManager;
use crate::core::transform::{build_pipeline, TransformPipeline};
use crate::domain::stage::Stage;
use crate::domain::{MigrationError, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

/// Run-level settings
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Stages to run, empty means all
    pub stages: Vec<Stage>,
    pub batch_size: usize,
    pub fast_resume: bool,
    pub enable_checkpointing: bool,
    pub import: ImportOptions,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        let driver = DriverOptions::default();
        Self {
            stages: Vec::new(),
            batch_size: driver.batch_size,
            fast_resume: driver.fast_resume,
            enable_checkpointing: true,
            import: ImportOptions::default(),
        }
    }
}

impl CoordinatorOptions {
    pub fn from_config(config: &FerryConfig) -> Self {
        Self {
            stages: config.import.stages.clone(),
            batch_size: config.import.batch_size,
            fast_resume: config.import.fast_resume,
            enable_checkpointing: config.state.enable_checkpointing,
            import: ImportOptions {
                merge_users_by_email: config.import.merge_users_by_email,
                attachments_path: config.import.attachments_path.clone(),
            },
        }
    }
}

/// Orchestrates one import run
pub struct MigrationCoordinator {
    source: Arc<dyn SourceAdapter>,
    cursor_storage: Arc<dyn CursorStorage>,
    importer: EntityImporter,
    options: CoordinatorOptions,
    shutdown: watch::Receiver<bool>,
}

impl MigrationCoordinator {
    pub fn new(
        source: Arc<dyn SourceAdapter>,
        target: Arc<dyn TargetRepository>,
        cursor_storage: Arc<dyn CursorStorage>,
        options: CoordinatorOptions,
        pipeline: TransformPipeline,
        hooks: HookRegistry,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let importer = EntityImporter::new(target, pipeline, hooks, options.import.clone());
        Self {
            source,
            cursor_storage,
            importer,
            options,
            shutdown,
        }
    }

    /// Connects the configured source and target and builds the pipeline
    ///
    /// # Errors
    ///
    /// Returns an error if a connection cannot be established or the
    /// transform rules are invalid.
    pub async fn from_config(
        config: &FerryConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let dialect = config
            .transform
            .dialect()
            .map_err(MigrationError::Configuration)?;
        let pipeline = build_pipeline(dialect, config.transform.rules_file.as_deref())?;
        let hooks = HookRegistry::from_config(&config.hooks, config.import.avatars_path.clone());

        let source = create_source(config).await?;
        let (target, cursor_storage) = create_target(config).await?;

        tracing::debug!(
            source = source.name(),
            dialect = %dialect,
            rules = pipeline.len(),
            hooks = ?hooks.names(),
            "Migration coordinator configured"
        );

        Ok(Self::new(
            source,
            target,
            cursor_storage,
            CoordinatorOptions::from_config(config),
            pipeline,
            hooks,
            shutdown,
        ))
    }

    pub fn options(&self) -> &CoordinatorOptions {
        &self.options
    }

    /// Execute the import
    ///
    /// Runs every selected stage, stopping early when the shutdown signal
    /// fires, then the global resolution pass unless the run was
    /// interrupted. Skipped rows never fail the run.
    ///
    /// # Errors
    ///
    /// Returns an error when the identity rebuild, a cursor checkpoint or
    /// the post scan of the global pass fails.
    pub async fn execute(&self) -> Result<ImportSummary> {
        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("import_run", run_id = %run_id);
        self.run(run_id).instrument(span).await
    }

    async fn run(&self, run_id: String) -> Result<ImportSummary> {
        let started = Instant::now();
        let mut summary = ImportSummary::new(run_id.clone());
        let stages = Stage::ordered_subset(&self.options.stages);

        tracing::info!(
            stages = ?stages.iter().map(Stage::as_str).collect::<Vec<_>>(),
            batch_size = self.options.batch_size,
            "Starting import run"
        );

        let rebuilt = rebuild(self.importer.target(), self.options.batch_size).await?;
        let mut state = RunState::new(rebuilt.identity, rebuilt.locator);

        let cursors = CursorManager::new(self.cursor_storage.clone())
            .enable_checkpointing(self.options.enable_checkpointing);
        let driver = BatchDriver::new(
            self.source.clone(),
            cursors,
            DriverOptions {
                batch_size: self.options.batch_size,
                fast_resume: self.options.fast_resume,
            },
            run_id,
            self.shutdown.clone(),
        );

        for stage in stages {
            let stage_summary = driver
                .run_stage(stage, &self.importer, &mut state, &mut summary)
                .await?;
            let interrupted = stage_summary.interrupted;
            summary.stages.insert(stage, stage_summary);
            if interrupted {
                summary.interrupted = true;
                break;
            }
        }

        summary
            .unresolved_references
            .append(&mut state.unresolved);

        if summary.interrupted {
            tracing::info!("Run interrupted, global resolution pass postponed to the next run");
        } else {
            let ctx = ResolveContext {
                identity: &state.identity,
                locator: &state.locator,
                target: self.importer.target(),
            };
            let shutdown = self.shutdown.clone();
            let should_stop = move || *shutdown.borrow();
            let report = self
                .importer
                .resolver()
                .global_pass(ctx, self.options.batch_size, &should_stop)
                .await?;

            summary.posts_rewritten = report.posts_rewritten;
            summary.unresolved_references.extend(report.unresolved);
            summary.interrupted = report.interrupted;
        }

        let summary = summary.with_duration(started.elapsed());
        summary.log_summary();
        Ok(summary)
    }
}
