//! Domain error types
//!
//! Fatal errors stop a run and surface through [`MigrationError`]. Per-row
//! problems never stop a run; they are described by [`RowIssue`] and collected
//! in the import summary.

use crate::domain::ids::{EntityType, LegacyId};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Main migration error type
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Source adapter errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Target repository errors
    #[error("Target error: {0}")]
    Target(#[from] TargetError),

    /// Database-related errors (generic)
    #[error("Database error: {0}")]
    Database(String),

    /// Network/connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Cursor state errors
    #[error("State management error: {0}")]
    State(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Errors raised while reading legacy rows
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to connect to the legacy database
    #[error("Failed to connect to source: {0}")]
    ConnectionFailed(String),

    /// Page or count query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A row could not be decoded into a source row
    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

/// Errors raised by the target repository
#[derive(Debug, Error)]
pub enum TargetError {
    /// The target rejected the attributes
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Failed to connect to the target
    #[error("Failed to connect to target: {0}")]
    ConnectionFailed(String),

    /// Statement or transaction failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Filesystem failure while storing an upload
    #[error("Upload storage failed: {0}")]
    Storage(String),

    /// Referenced entity does not exist in the target
    #[error("Not found: {0}")]
    NotFound(String),
}

impl TargetError {
    /// Single-reason validation rejection
    pub fn validation(reason: impl Into<String>) -> Self {
        TargetError::Validation(vec![reason.into()])
    }

    /// Whether the error is a rejection of the attributes rather than I/O
    pub fn is_validation(&self) -> bool {
        matches!(self, TargetError::Validation(_))
    }
}

impl From<std::io::Error> for MigrationError {
    fn from(err: std::io::Error) -> Self {
        MigrationError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(err: serde_json::Error) -> Self {
        MigrationError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for MigrationError {
    fn from(err: toml::de::Error) -> Self {
        MigrationError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<regex::Error> for MigrationError {
    fn from(err: regex::Error) -> Self {
        MigrationError::Configuration(format!("Invalid pattern: {err}"))
    }
}

/// Category of a skipped row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowIssueKind {
    /// A required parent reference could not be resolved
    MissingParent,
    /// The target rejected the row's attributes
    Validation,
    /// A network or filesystem failure prevented the row or page
    TransientIo,
}

impl fmt::Display for RowIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RowIssueKind::MissingParent => "missing_parent",
            RowIssueKind::Validation => "validation",
            RowIssueKind::TransientIo => "transient_io",
        };
        f.write_str(name)
    }
}

/// A skipped row with the reason it was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    /// Category of the issue
    pub kind: RowIssueKind,
    /// Entity type of the skipped row
    pub entity_type: EntityType,
    /// Legacy id of the skipped row, absent for page-level failures
    pub legacy_id: Option<LegacyId>,
    /// Human readable reason
    pub message: String,
}

impl RowIssue {
    /// Required foreign key could not be resolved
    pub fn missing_parent(
        entity_type: EntityType,
        legacy_id: &LegacyId,
        parent_type: EntityType,
        parent_id: &LegacyId,
    ) -> Self {
        Self {
            kind: RowIssueKind::MissingParent,
            entity_type,
            legacy_id: Some(legacy_id.clone()),
            message: format!("{parent_type} {parent_id} is not mapped"),
        }
    }

    /// Required foreign key column is absent from the row
    pub fn missing_field(entity_type: EntityType, legacy_id: &LegacyId, field: &str) -> Self {
        Self {
            kind: RowIssueKind::MissingParent,
            entity_type,
            legacy_id: Some(legacy_id.clone()),
            message: format!("required reference {field} is empty"),
        }
    }

    /// Target rejected the attributes
    pub fn validation(entity_type: EntityType, legacy_id: &LegacyId, reason: impl Into<String>) -> Self {
        Self {
            kind: RowIssueKind::Validation,
            entity_type,
            legacy_id: Some(legacy_id.clone()),
            message: reason.into(),
        }
    }

    /// Network or filesystem failure
    pub fn transient(
        entity_type: EntityType,
        legacy_id: Option<&LegacyId>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind: RowIssueKind::TransientIo,
            entity_type,
            legacy_id: legacy_id.cloned(),
            message: reason.into(),
        }
    }

    /// Classifies a target failure as validation or transient I/O
    pub fn from_target_error(entity_type: EntityType, legacy_id: &LegacyId, err: &TargetError) -> Self {
        if err.is_validation() {
            Self::validation(entity_type, legacy_id, err.to_string())
        } else {
            Self::transient(entity_type, Some(legacy_id), err.to_string())
        }
    }
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.legacy_id {
            Some(id) => write!(f, "{} {} {}: {}", self.kind, self.entity_type, id, self.message),
            None => write!(f, "{} {}: {}", self.kind, self.entity_type, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_error_display() {
        let err = MigrationError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_target_error_conversion() {
        let target_err = TargetError::validation("username is blank");
        let err: MigrationError = target_err.into();
        assert!(matches!(err, MigrationError::Target(TargetError::Validation(_))));
        assert!(err.to_string().contains("username is blank"));
    }

    #[test]
    fn test_source_error_conversion() {
        let err: MigrationError = SourceError::QueryFailed("timeout".to_string()).into();
        assert!(matches!(err, MigrationError::Source(_)));
    }

    #[test]
    fn test_validation_reasons_joined() {
        let err = TargetError::Validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Validation failed: a; b");
    }

    #[test]
    fn test_row_issue_classification() {
        let id = LegacyId::from(5);
        let rejected = RowIssue::from_target_error(
            EntityType::Post,
            &id,
            &TargetError::validation("raw is blank"),
        );
        assert_eq!(rejected.kind, RowIssueKind::Validation);

        let io = RowIssue::from_target_error(
            EntityType::Post,
            &id,
            &TargetError::QueryFailed("connection reset".to_string()),
        );
        assert_eq!(io.kind, RowIssueKind::TransientIo);
    }

    #[test]
    fn test_row_issue_display() {
        let issue = RowIssue::missing_parent(
            EntityType::Post,
            &LegacyId::from(20),
            EntityType::Topic,
            &LegacyId::from(10),
        );
        assert_eq!(issue.to_string(), "missing_parent post 20: topic 10 is not mapped");
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: MigrationError = toml_err.into();
        assert!(matches!(err, MigrationError::Configuration(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: MigrationError = io_err.into();
        assert!(matches!(err, MigrationError::Io(_)));
    }
}
