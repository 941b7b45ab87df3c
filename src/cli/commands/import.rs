//! Import command implementation
//!
//! This module implements the `import` command, which migrates the legacy
//! forum into the target platform and can be re-run to resume.

use super::exit_code_for;
use crate::config::{load_config, parse_stage_list, FerryConfig, MAX_BATCH_SIZE};
use crate::core::import::{ImportSummary, MigrationCoordinator};
use crate::domain::{RowIssueKind, Stage};
use clap::Args;
use tokio::sync::watch;

/// Issues and references printed before the rest is elided
const MAX_LISTED: usize = 10;

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Stages to run (comma-separated), always executed in dependency order
    #[arg(long, value_name = "STAGES")]
    pub stage: Option<String>,

    /// Override the page size
    #[arg(long)]
    pub batch_size: Option<usize>,
}

impl ImportArgs {
    /// Execute the import command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting import command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        if let Err(e) = self.apply_overrides(&mut config) {
            tracing::error!(error = %e, "Invalid command line override");
            eprintln!("{e}");
            return Ok(2);
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        if !self.yes && !confirm(&config)? {
            println!("Import cancelled.");
            return Ok(0);
        }

        tracing::info!("Creating migration coordinator");
        let coordinator = match MigrationCoordinator::from_config(&config, shutdown_signal).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create migration coordinator");
                eprintln!("Failed to initialize import: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!("🚀 Starting import...");
        println!();

        let summary = match coordinator.execute().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Import failed");
                eprintln!("Import failed: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        print_summary(&summary);
        Ok(summary_exit_code(&summary))
    }

    fn apply_overrides(&self, config: &mut FerryConfig) -> Result<(), String> {
        if let Some(stages) = &self.stage {
            let stages = parse_stage_list(stages)?;
            tracing::info!(stages = ?stages, "Overriding stages from CLI");
            config.import.stages = stages;
        }

        if let Some(batch_size) = self.batch_size {
            if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
                return Err(format!(
                    "--batch-size must be between 1 and {MAX_BATCH_SIZE}, got {batch_size}"
                ));
            }
            tracing::info!(batch_size, "Overriding batch size from CLI");
            config.import.batch_size = batch_size;
        }

        Ok(())
    }
}

fn confirm(config: &FerryConfig) -> anyhow::Result<bool> {
    use std::io::{self, Write};

    let stages = Stage::ordered_subset(&config.import.stages);
    println!("Import Configuration:");
    println!("  Environment: {:?}", config.environment);
    println!("  Source: {:?}", config.source.kind);
    println!("  Target: {:?} ({})", config.target.kind, config.target.base_url);
    println!(
        "  Stages: {}",
        stages.iter().map(Stage::as_str).collect::<Vec<_>>().join(", ")
    );
    println!("  Batch size: {}", config.import.batch_size);
    println!("  Dialect: {}", config.transform.dialect);
    println!();
    print!("Proceed with import? [y/N]: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn print_summary(summary: &ImportSummary) {
    println!();
    println!("📊 Import Summary (run {}):", summary.run_id);
    println!(
        "  {:<18} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "Stage", "Total", "New", "Merged", "Existing", "Skipped"
    );
    for (stage, s) in &summary.stages {
        println!(
            "  {:<18} {:>8} {:>8} {:>8} {:>8} {:>8}",
            stage.as_str(),
            s.total,
            s.imported,
            s.merged,
            s.already_imported,
            s.skipped
        );
    }
    println!();
    println!("  Imported: {}", summary.total_imported());
    println!(
        "  Skipped: {} (missing parent {}, validation {}, transient {})",
        summary.total_skipped(),
        summary.issue_count(RowIssueKind::MissingParent),
        summary.issue_count(RowIssueKind::Validation),
        summary.issue_count(RowIssueKind::TransientIo)
    );
    println!("  Posts rewritten: {}", summary.posts_rewritten);
    println!("  Hook failures: {}", summary.hook_failures());
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!();

    if !summary.issues.is_empty() {
        println!("⚠️  Skipped rows:");
        for issue in summary.issues.iter().take(MAX_LISTED) {
            println!("  - {}", issue);
        }
        if summary.issues.len() > MAX_LISTED {
            println!("  ... and {} more", summary.issues.len() - MAX_LISTED);
        }
        println!();
    }

    if !summary.unresolved_references.is_empty() {
        println!("⚠️  Unresolved references:");
        for reference in summary.unresolved_references.iter().take(MAX_LISTED) {
            println!(
                "  - {} {} in {}: {}",
                reference.kind, reference.reference, reference.origin, reference.token
            );
        }
        if summary.unresolved_references.len() > MAX_LISTED {
            println!(
                "  ... and {} more",
                summary.unresolved_references.len() - MAX_LISTED
            );
        }
        println!();
    }
}

/// 130 when interrupted, 1 when rows were skipped or references left
/// unresolved, 0 otherwise
fn summary_exit_code(summary: &ImportSummary) -> i32 {
    if summary.interrupted {
        println!("⚠️  Import interrupted gracefully. Progress saved.");
        println!("   Run the same command to resume.");
        println!();
        tracing::info!("Import interrupted by user signal");
        130
    } else if summary.is_clean() {
        println!("✅ Import completed successfully!");
        0
    } else {
        println!("⚠️  Import completed with skipped rows or unresolved references");
        1
    }
}
