//! Import summary and reporting
//!
//! This module defines structures for tracking and reporting import results.

use crate::core::resolve::UnresolvedReference;
use crate::domain::errors::{RowIssue, RowIssueKind};
use crate::domain::stage::Stage;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Progress and outcome of one stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    /// Row count reported by the source when the stage started
    pub total: u64,

    /// Rows looked at by this run, including fast-resumed ones
    pub processed: u64,

    /// Rows persisted by this run
    pub imported: usize,

    /// Rows mapped by a natural key instead of being created
    pub merged: usize,

    /// Rows whose mapping already existed
    pub already_imported: usize,

    /// Rows skipped with an issue
    pub skipped: usize,

    /// Pages skipped because every row was already mapped
    pub pages_fast_resumed: usize,

    /// Post-commit hook failures
    pub hook_failures: usize,

    /// Whether the stage was stopped before reaching its end
    pub interrupted: bool,
}

impl StageSummary {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }
}

/// Summary of an import run
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    /// Identifier of the run, also recorded on its tracing span
    pub run_id: String,

    /// Per stage results in stage order
    pub stages: BTreeMap<Stage, StageSummary>,

    /// Every skipped row with its reason
    pub issues: Vec<RowIssue>,

    /// References left as original text
    pub unresolved_references: Vec<UnresolvedReference>,

    /// Posts rewritten by the global resolution pass
    pub posts_rewritten: usize,

    /// Whether the run was stopped by an operator interrupt
    pub interrupted: bool,

    /// Duration of the run
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl ImportSummary {
    /// Create a new empty import summary
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            stages: BTreeMap::new(),
            issues: Vec::new(),
            unresolved_references: Vec::new(),
            posts_rewritten: 0,
            interrupted: false,
            duration: Duration::from_secs(0),
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn add_issue(&mut self, issue: RowIssue) {
        self.issues.push(issue);
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageSummary> {
        self.stages.get(&stage)
    }

    pub fn total_imported(&self) -> usize {
        self.stages.values().map(|s| s.imported + s.merged).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.stages.values().map(|s| s.skipped).sum()
    }

    pub fn hook_failures(&self) -> usize {
        self.stages.values().map(|s| s.hook_failures).sum()
    }

    /// Number of issues of one kind
    pub fn issue_count(&self, kind: RowIssueKind) -> usize {
        self.issues.iter().filter(|issue| issue.kind == kind).count()
    }

    /// Check if every row was imported and every reference resolved
    pub fn is_clean(&self) -> bool {
        !self.interrupted && self.issues.is_empty() && self.unresolved_references.is_empty()
    }

    /// Log the summary
    pub fn log_summary(&self) {
        for (stage, summary) in &self.stages {
            tracing::info!(
                stage = %stage,
                total = summary.total,
                processed = summary.processed,
                imported = summary.imported,
                merged = summary.merged,
                already_imported = summary.already_imported,
                skipped = summary.skipped,
                hook_failures = summary.hook_failures,
                "Stage summary"
            );
        }

        tracing::info!(
            run_id = %self.run_id,
            imported = self.total_imported(),
            skipped = self.total_skipped(),
            missing_parent = self.issue_count(RowIssueKind::MissingParent),
            validation = self.issue_count(RowIssueKind::Validation),
            transient_io = self.issue_count(RowIssueKind::TransientIo),
            unresolved_references = self.unresolved_references.len(),
            posts_rewritten = self.posts_rewritten,
            interrupted = self.interrupted,
            duration_secs = self.duration.as_secs(),
            "Import completed"
        );
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
