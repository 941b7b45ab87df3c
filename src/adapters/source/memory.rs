//! In-memory source adapter

use super::{SourceAdapter, SourceResult};
use crate::domain::errors::SourceError;
use crate::domain::row::SourceRow;
use crate::domain::stage::Stage;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

/// Source holding its rows in memory, keyed by stage
///
/// Used for tests and for replaying exported fixtures. Pages can be made to
/// fail on demand to exercise transient I/O handling.
///
/// # Examples
///
/// ```
/// use ferry::adapters::source::MemorySource;
/// use ferry::domain::Stage;
/// use serde_json::json;
///
/// let source = MemorySource::new()
///     .with_row(Stage::Users, 1, json!({"username": "alice"}))
///     .unwrap();
/// assert_eq!(source.rows(Stage::Users).len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemorySource {
    stages: HashMap<Stage, BTreeMap<i64, SourceRow>>,
    failing_pages: Mutex<HashSet<(Stage, Option<i64>)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a row whose legacy id is its key
    pub fn with_row(mut self, stage: Stage, key: i64, fields: Value) -> SourceResult<Self> {
        self.insert(stage, SourceRow::new(key, fields)?);
        Ok(self)
    }

    /// Adds a prepared row, replacing any row with the same key
    pub fn insert(&mut self, stage: Stage, row: SourceRow) {
        self.stages.entry(stage).or_default().insert(row.key, row);
    }

    /// Makes the next fetch of `stage` after `after` fail once
    pub fn fail_page_once(&self, stage: Stage, after: Option<i64>) {
        if let Ok(mut failing) = self.failing_pages.lock() {
            failing.insert((stage, after));
        }
    }

    /// Rows of a stage in key order
    pub fn rows(&self, stage: Stage) -> Vec<&SourceRow> {
        self.stages
            .get(&stage)
            .map(|rows| rows.values().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SourceAdapter for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn count(&self, stage: Stage) -> SourceResult<u64> {
        Ok(self.stages.get(&stage).map_or(0, |rows| rows.len() as u64))
    }

    async fn fetch(
        &self,
        stage: Stage,
        after: Option<i64>,
        limit: usize,
    ) -> SourceResult<Vec<SourceRow>> {
        let should_fail = self
            .failing_pages
            .lock()
            .map(|mut failing| failing.remove(&(stage, after)))
            .unwrap_or(false);
        if should_fail {
            return Err(SourceError::QueryFailed(format!(
                "simulated failure fetching {stage} after {after:?}"
            )));
        }

        let Some(rows) = self.stages.get(&stage) else {
            return Ok(Vec::new());
        };

        let page = match after {
            Some(key) => rows
                .range((std::ops::Bound::Excluded(key), std::ops::Bound::Unbounded))
                .take(limit)
                .map(|(_, row)| row.clone())
                .collect(),
            None => rows.values().take(limit).cloned().collect(),
        };
        Ok(page)
    }
}
