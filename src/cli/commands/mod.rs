//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod import;
pub mod init;
pub mod status;
pub mod validate;

use crate::domain::{MigrationError, SourceError, TargetError};

/// Exit code for an error that ended a command
///
/// 2 for configuration errors, 4 when the source or target cannot be
/// reached, 5 for everything else.
pub fn exit_code_for(err: &MigrationError) -> i32 {
    match err {
        MigrationError::Configuration(_) => 2,
        MigrationError::Database(_)
        | MigrationError::Connection(_)
        | MigrationError::Source(SourceError::ConnectionFailed(_))
        | MigrationError::Target(TargetError::ConnectionFailed(_)) => 4,
        _ => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(MigrationError::Configuration("bad".into()), 2)]
    #[test_case(MigrationError::Database("refused".into()), 4)]
    #[test_case(MigrationError::Source(SourceError::ConnectionFailed("down".into())), 4)]
    #[test_case(MigrationError::Target(TargetError::ConnectionFailed("down".into())), 4)]
    #[test_case(MigrationError::Source(SourceError::QueryFailed("syntax".into())), 5)]
    #[test_case(MigrationError::State("lost".into()), 5)]
    fn test_exit_code_for(err: MigrationError, expected: i32) {
        assert_eq!(exit_code_for(&err), expected);
    }
}
