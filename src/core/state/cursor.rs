//! Batch cursor model for resumable stages
//!
//! A cursor remembers the last legacy key a stage has processed. It is only
//! used to resume a stage quickly; whether a row still needs importing is
//! always decided by the identity map.

use crate::domain::stage::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a stage run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has never been started
    #[default]
    NotStarted,
    /// Stage is running or was cut off by a crash
    InProgress,
    /// Stage processed every page
    Completed,
    /// Stage was stopped by an operator interrupt
    Interrupted,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::NotStarted => "not_started",
            StageStatus::InProgress => "in_progress",
            StageStatus::Completed => "completed",
            StageStatus::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(StageStatus::NotStarted),
            "in_progress" => Ok(StageStatus::InProgress),
            "completed" => Ok(StageStatus::Completed),
            "interrupted" => Ok(StageStatus::Interrupted),
            other => Err(format!("Unknown stage status: {other}")),
        }
    }
}

/// Resumable position of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCursor {
    pub stage: Stage,

    /// Largest legacy key processed so far
    pub last_key: Option<i64>,

    /// Rows processed (imported or skipped) by the run that owns the cursor
    pub rows_processed: u64,

    pub status: StageStatus,

    /// Run that last touched the cursor
    pub run_id: Option<String>,

    pub started_at: Option<DateTime<Utc>>,

    pub updated_at: DateTime<Utc>,
}

impl BatchCursor {
    /// Fresh cursor for a stage that has never run
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            last_key: None,
            rows_processed: 0,
            status: StageStatus::NotStarted,
            run_id: None,
            started_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Whether a new run should continue from `last_key`
    ///
    /// Only unfinished stages resume; a completed stage is scanned from the
    /// beginning so rows skipped earlier get another chance.
    pub fn is_resumable(&self) -> bool {
        matches!(
            self.status,
            StageStatus::InProgress | StageStatus::Interrupted
        )
    }

    /// Key the next page starts after
    pub fn resume_after(&self) -> Option<i64> {
        if self.is_resumable() {
            self.last_key
        } else {
            None
        }
    }

    /// Marks the stage as started by `run_id`
    ///
    /// A completed or never-started stage is rewound to its beginning.
    pub fn mark_started(&mut self, run_id: &str) {
        if !self.is_resumable() {
            self.last_key = None;
            self.rows_processed = 0;
        }
        self.status = StageStatus::InProgress;
        self.run_id = Some(run_id.to_string());
        self.started_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Moves the cursor forward, never backwards
    pub fn advance(&mut self, key: i64, rows: u64) {
        if self.last_key.map_or(true, |last| key > last) {
            self.last_key = Some(key);
        }
        self.rows_processed += rows;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self) {
        self.status = StageStatus::Completed;
        self.updated_at = Utc::now();
    }

    pub fn mark_interrupted(&mut self) {
        self.status = StageStatus::Interrupted;
        self.updated_at = Utc::now();
    }
}
