//! Cursor manager for stage checkpoints
//!
//! This module provides the CursorManager for loading and saving stage
//! cursors through a storage backend.

use crate::adapters::target::CursorStorage;
use crate::core::state::cursor::BatchCursor;
use crate::domain::stage::Stage;
use crate::domain::Result;
use std::sync::Arc;

/// Cursor manager for stage checkpoints
///
/// Loads the cursor of a stage before it runs and saves it after every
/// page. With checkpointing disabled every stage starts from the beginning
/// and nothing is written; the identity map still guarantees that no row is
/// imported twice.
pub struct CursorManager {
    storage: Arc<dyn CursorStorage>,
    checkpointing: bool,
}

impl CursorManager {
    /// Create a new CursorManager with a cursor storage backend
    pub fn new(storage: Arc<dyn CursorStorage>) -> Self {
        Self {
            storage,
            checkpointing: true,
        }
    }

    /// Enables or disables cursor persistence
    pub fn enable_checkpointing(mut self, enabled: bool) -> Self {
        self.checkpointing = enabled;
        self
    }

    pub fn is_checkpointing(&self) -> bool {
        self.checkpointing
    }

    /// Load the cursor of a stage, or a fresh one if none is stored
    ///
    /// # Errors
    ///
    /// Returns an error if the storage query fails.
    pub async fn load(&self, stage: Stage) -> Result<BatchCursor> {
        if !self.checkpointing {
            return Ok(BatchCursor::new(stage));
        }
        Ok(self
            .storage
            .load_cursor(stage)
            .await?
            .unwrap_or_else(|| BatchCursor::new(stage)))
    }

    /// Checkpoint a stage by saving its cursor
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint fails.
    pub async fn checkpoint(&self, cursor: &BatchCursor) -> Result<()> {
        if !self.checkpointing {
            return Ok(());
        }
        tracing::debug!(
            stage = %cursor.stage,
            last_key = ?cursor.last_key,
            rows_processed = cursor.rows_processed,
            status = %cursor.status,
            "Checkpointing stage cursor"
        );
        self.storage.save_cursor(cursor).await
    }

    /// Every stored cursor, in stage order
    pub async fn all(&self) -> Result<Vec<BatchCursor>> {
        let mut cursors = self.storage.load_all_cursors().await?;
        cursors.sort_by_key(|cursor| cursor.stage);
        Ok(cursors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::target::MemoryTarget;
    use crate::core::state::cursor::StageStatus;

    #[tokio::test]
    async fn test_load_defaults_to_fresh_cursor() {
        let manager = CursorManager::new(Arc::new(MemoryTarget::new()));
        let cursor = manager.load(Stage::Posts).await.unwrap();
        assert_eq!(cursor.status, StageStatus::NotStarted);
        assert_eq!(cursor.last_key, None);
    }

    #[tokio::test]
    async fn test_checkpoint_round_trip() {
        let manager = CursorManager::new(Arc::new(MemoryTarget::new()));
        let mut cursor = BatchCursor::new(Stage::Topics);
        cursor.mark_started("run-1");
        cursor.advance(42, 3);
        manager.checkpoint(&cursor).await.unwrap();

        let loaded = manager.load(Stage::Topics).await.unwrap();
        assert_eq!(loaded.last_key, Some(42));
        assert_eq!(loaded.status, StageStatus::InProgress);
        assert_eq!(manager.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_checkpointing_writes_nothing() {
        let storage = Arc::new(MemoryTarget::new());
        let manager = CursorManager::new(storage.clone()).enable_checkpointing(false);
        let mut cursor = BatchCursor::new(Stage::Users);
        cursor.advance(7, 1);
        manager.checkpoint(&cursor).await.unwrap();

        assert!(storage.load_cursor(Stage::Users).await.unwrap().is_none());
        assert!(!manager.is_checkpointing());
    }
}
