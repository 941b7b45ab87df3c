//! Integration tests for logging functionality

use ferry::config::LoggingConfig;
use ferry::domain::{EntityType, LegacyId, RowIssue, Stage};
use ferry::logging::structured::parse_log_level;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(!config.local_enabled);
    assert_eq!(config.local_path, "./logs");
    assert_eq!(config.local_rotation, "daily");
}

#[test]
fn test_parse_log_level() {
    assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
    assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
    assert!(parse_log_level("verbose").is_err());
}

#[test]
fn test_logging_macros_usage() {
    // Macros are usable from outside the crate without a subscriber
    let issue = RowIssue::missing_parent(
        EntityType::Post,
        &LegacyId::from(20),
        EntityType::Topic,
        &LegacyId::from(10),
    );

    ferry::log_stage_start!(Stage::Posts, 100u64, Some(19i64));
    ferry::log_row_skipped!(&issue);
    ferry::log_batch_progress!(Stage::Posts, 50u64, 100u64);
    ferry::log_stage_complete!(Stage::Posts, 99usize, 1usize, Duration::from_secs(2));

    assert!(issue.to_string().contains("20"));
}

// init_logging installs a global subscriber and can only run once per process
