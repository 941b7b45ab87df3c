//! Source adapter abstraction
//!
//! A source adapter streams the rows of one legacy platform, stage by stage,
//! ordered by a monotonic integer key.

pub mod memory;

use crate::domain::errors::SourceError;
use crate::domain::row::SourceRow;
use crate::domain::stage::Stage;
use async_trait::async_trait;

pub use memory::MemorySource;

/// Result type for source operations
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Reader for one legacy dataset
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Total number of rows of a stage
    ///
    /// Called once per stage run for progress reporting.
    async fn count(&self, stage: Stage) -> SourceResult<u64>;

    /// Next page of a stage
    ///
    /// Returns at most `limit` rows whose key is greater than `after`,
    /// ordered by key. An empty page ends the stage.
    async fn fetch(
        &self,
        stage: Stage,
        after: Option<i64>,
        limit: usize,
    ) -> SourceResult<Vec<SourceRow>>;
}
