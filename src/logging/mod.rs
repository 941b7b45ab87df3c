//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console output with configurable log levels
//! - JSON-formatted local file logging with rotation
//!
//! # Example
//!
//! ```no_run
//! use ferry::logging::init_logging;
//! use ferry::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of a stage
///
/// # Example
///
/// ```no_run
/// use ferry::log_stage_start;
/// use ferry::domain::Stage;
///
/// log_stage_start!(Stage::Users, 1200, Some(40));
/// ```
#[macro_export]
macro_rules! log_stage_start {
    ($stage:expr, $total:expr, $resume_after:expr) => {
        tracing::info!(
            stage = %$stage,
            total = $total,
            resume_after = ?$resume_after,
            "Starting stage"
        );
    };
}

/// Log the completion of a stage
///
/// # Example
///
/// ```no_run
/// use ferry::log_stage_complete;
/// use ferry::domain::Stage;
/// use std::time::Duration;
///
/// log_stage_complete!(Stage::Posts, 980, 20, Duration::from_secs(12));
/// ```
#[macro_export]
macro_rules! log_stage_complete {
    ($stage:expr, $imported:expr, $skipped:expr, $duration:expr) => {
        tracing::info!(
            stage = %$stage,
            imported = $imported,
            skipped = $skipped,
            duration_ms = $duration.as_millis(),
            "Stage completed"
        );
    };
}

/// Log a skipped row with its issue
///
/// # Example
///
/// ```no_run
/// use ferry::log_row_skipped;
/// use ferry::domain::{EntityType, LegacyId, RowIssue};
///
/// let issue = RowIssue::missing_parent(
///     EntityType::Post,
///     &LegacyId::from(20),
///     EntityType::Topic,
///     &LegacyId::from(10),
/// );
/// log_row_skipped!(&issue);
/// ```
#[macro_export]
macro_rules! log_row_skipped {
    ($issue:expr) => {
        tracing::warn!(
            kind = %$issue.kind,
            entity_type = %$issue.entity_type,
            legacy_id = ?$issue.legacy_id.as_ref().map(|id| id.as_str()),
            reason = %$issue.message,
            "Row skipped"
        );
    };
}

/// Log batch progress of a stage
///
/// # Example
///
/// ```no_run
/// use ferry::log_batch_progress;
/// use ferry::domain::Stage;
///
/// log_batch_progress!(Stage::Topics, 100, 1000);
/// ```
#[macro_export]
macro_rules! log_batch_progress {
    ($stage:expr, $processed:expr, $total:expr) => {
        tracing::info!(
            stage = %$stage,
            processed = $processed,
            total = $total,
            progress_pct = if $total == 0 {
                100.0
            } else {
                $processed as f64 / $total as f64 * 100.0
            },
            "Batch progress"
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::domain::{EntityType, LegacyId, RowIssue, Stage};
    use std::time::Duration;

    #[test]
    fn test_macros_expand_without_subscriber() {
        let issue = RowIssue::validation(EntityType::User, &LegacyId::from(3), "username is blank");
        crate::log_stage_start!(Stage::Users, 10u64, None::<i64>);
        crate::log_row_skipped!(&issue);
        crate::log_batch_progress!(Stage::Users, 5u64, 10u64);
        crate::log_batch_progress!(Stage::Users, 0u64, 0u64);
        crate::log_stage_complete!(Stage::Users, 9usize, 1usize, Duration::from_millis(3));
    }
}
