//! Batch driver
//!
//! Pages through one stage of the source in legacy key order, hands every
//! row to the importer and keeps the stage cursor up to date.

use super::importer::{EntityImporter, RowOutcome, RunState};
use super::summary::{ImportSummary, StageSummary};
use crate::adapters::source::SourceAdapter;
use crate::core::state::CursorManager;
use crate::domain::errors::RowIssue;
use crate::domain::stage::Stage;
use crate::domain::Result;
use crate::{log_batch_progress, log_row_skipped, log_stage_complete, log_stage_start};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Paging behaviour of the driver
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Rows requested per page
    pub batch_size: usize,
    /// Skip pages whose rows are all mapped already
    pub fast_resume: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            batch_size: 500,
            fast_resume: true,
        }
    }
}

/// Runs stages page by page
pub struct BatchDriver {
    source: Arc<dyn SourceAdapter>,
    cursors: CursorManager,
    options: DriverOptions,
    run_id: String,
    shutdown: watch::Receiver<bool>,
}

impl BatchDriver {
    pub fn new(
        source: Arc<dyn SourceAdapter>,
        cursors: CursorManager,
        options: DriverOptions,
        run_id: impl Into<String>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            cursors,
            options,
            run_id: run_id.into(),
            shutdown,
        }
    }

    fn should_stop(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Imports every remaining row of a stage
    ///
    /// Skipped rows are added to `summary` as issues. A page that cannot be
    /// fetched ends the stage early and leaves its cursor in progress, so
    /// the next run continues from the last committed page.
    ///
    /// # Errors
    ///
    /// Returns an error only when the cursor cannot be loaded or saved.
    pub async fn run_stage(
        &self,
        stage: Stage,
        importer: &EntityImporter,
        state: &mut RunState,
        summary: &mut ImportSummary,
    ) -> Result<StageSummary> {
        let started = Instant::now();
        let entity_type = stage.entity_type();

        let mut cursor = self.cursors.load(stage).await?;
        cursor.mark_started(&self.run_id);
        self.cursors.checkpoint(&cursor).await?;

        let total = match self.source.count(stage).await {
            Ok(total) => total,
            Err(e) => {
                tracing::warn!(stage = %stage, error = %e, "Failed to count stage rows");
                0
            }
        };
        let mut stage_summary = StageSummary::new(total);
        let mut after = cursor.last_key;
        log_stage_start!(stage, total, after);

        let mut completed = false;
        'pages: loop {
            if self.should_stop() {
                stage_summary.interrupted = true;
                break;
            }

            let page = match self.source.fetch(stage, after, self.options.batch_size).await {
                Ok(page) => page,
                Err(e) => {
                    let issue = RowIssue::transient(
                        entity_type,
                        None,
                        format!("failed to fetch page after {after:?}: {e}"),
                    );
                    log_row_skipped!(&issue);
                    summary.add_issue(issue);
                    break;
                }
            };
            let Some(last) = page.last() else {
                completed = true;
                break;
            };
            let last_key = last.key;

            if self.options.fast_resume
                && state
                    .identity
                    .all_mapped(entity_type, page.iter().map(|row| &row.legacy_id))
            {
                let rows = page.len() as u64;
                stage_summary.processed += rows;
                stage_summary.already_imported += page.len();
                stage_summary.pages_fast_resumed += 1;
                cursor.advance(last_key, rows);
                self.cursors.checkpoint(&cursor).await?;
                after = Some(last_key);
                tracing::debug!(stage = %stage, last_key, "Page already imported, skipped");
                continue;
            }

            for row in &page {
                if self.should_stop() {
                    stage_summary.interrupted = true;
                    break 'pages;
                }

                match importer.import_row(stage, row, state).await {
                    RowOutcome::Imported {
                        entity,
                        hook_failures,
                    } => {
                        if entity.merged {
                            stage_summary.merged += 1;
                        } else {
                            stage_summary.imported += 1;
                        }
                        stage_summary.hook_failures += hook_failures;
                    }
                    RowOutcome::AlreadyImported => stage_summary.already_imported += 1,
                    RowOutcome::Skipped(issue) => {
                        log_row_skipped!(&issue);
                        stage_summary.skipped += 1;
                        summary.add_issue(issue);
                    }
                }
                stage_summary.processed += 1;
                cursor.advance(row.key, 1);
            }

            self.cursors.checkpoint(&cursor).await?;
            after = Some(last_key);
            log_batch_progress!(stage, cursor.rows_processed, total);
        }

        if stage_summary.interrupted {
            cursor.mark_interrupted();
            tracing::info!(stage = %stage, last_key = ?cursor.last_key, "Stage interrupted");
        } else if completed {
            cursor.mark_completed();
        }
        self.cursors.checkpoint(&cursor).await?;

        log_stage_complete!(
            stage,
            stage_summary.imported + stage_summary.merged,
            stage_summary.skipped,
            started.elapsed()
        );
        Ok(stage_summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::source::MemorySource;
    use crate::adapters::target::{CursorStorage, MemoryTarget};
    use crate::core::import::hooks::HookRegistry;
    use crate::core::import::importer::ImportOptions;
    use crate::core::state::StageStatus;
    use crate::core::transform::TransformPipeline;
    use crate::domain::errors::RowIssueKind;
    use serde_json::json;

    struct Harness {
        target: Arc<MemoryTarget>,
        importer: EntityImporter,
    }

    fn harness() -> Harness {
        let target = Arc::new(MemoryTarget::new());
        let importer = EntityImporter::new(
            target.clone(),
            TransformPipeline::empty(),
            HookRegistry::new(),
            ImportOptions::default(),
        );
        Harness { target, importer }
    }

    fn users(count: i64) -> MemorySource {
        let mut source = MemorySource::new();
        for id in 1..=count {
            source = source
                .with_row(Stage::Users, id, json!({ "username": format!("user_{id}") }))
                .unwrap();
        }
        source
    }

    fn driver(
        source: Arc<MemorySource>,
        target: Arc<MemoryTarget>,
        batch_size: usize,
        shutdown: watch::Receiver<bool>,
    ) -> BatchDriver {
        BatchDriver::new(
            source,
            CursorManager::new(target),
            DriverOptions {
                batch_size,
                fast_resume: true,
            },
            "run-test",
            shutdown,
        )
    }

    #[tokio::test]
    async fn test_stage_pages_until_empty() {
        let Harness { target, importer } = harness();
        let (_tx, rx) = watch::channel(false);
        let driver = driver(Arc::new(users(5)), target.clone(), 2, rx);
        let mut state = RunState::default();
        let mut summary = ImportSummary::new("run-test");

        let stage = driver
            .run_stage(Stage::Users, &importer, &mut state, &mut summary)
            .await
            .unwrap();

        assert_eq!(stage.total, 5);
        assert_eq!(stage.processed, 5);
        assert_eq!(stage.imported, 5);
        let cursor = target.load_cursor(Stage::Users).await.unwrap().unwrap();
        assert_eq!(cursor.status, StageStatus::Completed);
        assert_eq!(cursor.last_key, Some(5));
    }

    #[tokio::test]
    async fn test_second_run_fast_resumes_every_page() {
        let Harness { target, importer } = harness();
        let (_tx, rx) = watch::channel(false);
        let driver = driver(Arc::new(users(4)), target.clone(), 2, rx);
        let mut state = RunState::default();
        let mut summary = ImportSummary::new("run-test");

        driver
            .run_stage(Stage::Users, &importer, &mut state, &mut summary)
            .await
            .unwrap();
        let calls = target.create_calls();
        let again = driver
            .run_stage(Stage::Users, &importer, &mut state, &mut summary)
            .await
            .unwrap();

        assert_eq!(again.pages_fast_resumed, 2);
        assert_eq!(again.already_imported, 4);
        assert_eq!(again.imported, 0);
        assert_eq!(target.create_calls(), calls);
    }

    #[tokio::test]
    async fn test_interrupt_saves_cursor() {
        let Harness { target, importer } = harness();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let driver = driver(Arc::new(users(3)), target.clone(), 2, rx);
        let mut state = RunState::default();
        let mut summary = ImportSummary::new("run-test");

        let stage = driver
            .run_stage(Stage::Users, &importer, &mut state, &mut summary)
            .await
            .unwrap();

        assert!(stage.interrupted);
        assert_eq!(stage.imported, 0);
        let cursor = target.load_cursor(Stage::Users).await.unwrap().unwrap();
        assert_eq!(cursor.status, StageStatus::Interrupted);
        assert!(cursor.is_resumable());
    }

    #[tokio::test]
    async fn test_failed_page_ends_stage_with_transient_issue() {
        let Harness { target, importer } = harness();
        let source = users(4);
        source.fail_page_once(Stage::Users, Some(2));
        let (_tx, rx) = watch::channel(false);
        let driver = driver(Arc::new(source), target.clone(), 2, rx);
        let mut state = RunState::default();
        let mut summary = ImportSummary::new("run-test");

        let stage = driver
            .run_stage(Stage::Users, &importer, &mut state, &mut summary)
            .await
            .unwrap();
        assert_eq!(stage.imported, 2);
        assert_eq!(summary.issue_count(RowIssueKind::TransientIo), 1);

        let cursor = target.load_cursor(Stage::Users).await.unwrap().unwrap();
        assert_eq!(cursor.status, StageStatus::InProgress);

        // The next run resumes after the last committed page
        let resumed = driver
            .run_stage(Stage::Users, &importer, &mut state, &mut summary)
            .await
            .unwrap();
        assert_eq!(resumed.imported, 2);
        assert_eq!(resumed.processed, 2);
    }

    #[tokio::test]
    async fn test_missing_parent_rows_are_skipped() {
        let Harness { target, importer } = harness();
        let source = MemorySource::new()
            .with_row(Stage::Posts, 20, json!({ "topic_id": 10, "user_id": 1, "body": "orphan" }))
            .unwrap();
        let (_tx, rx) = watch::channel(false);
        let driver = driver(Arc::new(source), target, 10, rx);
        let mut state = RunState::default();
        let mut summary = ImportSummary::new("run-test");

        let stage = driver
            .run_stage(Stage::Posts, &importer, &mut state, &mut summary)
            .await
            .unwrap();
        assert_eq!(stage.skipped, 1);
        assert_eq!(summary.issues.len(), 1);
        assert_eq!(summary.issues[0].kind, RowIssueKind::MissingParent);
    }
}
