// Resumable stage cursors

pub mod cursor;
pub mod manager;

pub use cursor::{BatchCursor, StageStatus};
pub use manager::CursorManager;
