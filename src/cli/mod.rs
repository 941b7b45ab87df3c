//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Ferry using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Ferry - resumable legacy forum migration
#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(version, about, long_about = None)]
#[command(author = "Ferry Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "ferry.toml", env = "FERRY_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "FERRY_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import the legacy forum into the target platform
    Import(commands::import::ImportArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show stage cursors and imported entity counts
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_import() {
        let cli = Cli::parse_from(["ferry", "import"]);
        assert_eq!(cli.config, "ferry.toml");
        assert!(matches!(cli.command, Commands::Import(_)));
    }

    #[test]
    fn test_cli_parse_import_overrides() {
        let cli = Cli::parse_from([
            "ferry",
            "import",
            "--yes",
            "--stage",
            "users,posts",
            "--batch-size",
            "250",
        ]);
        let Commands::Import(args) = cli.command else {
            panic!("expected import command");
        };
        assert!(args.yes);
        assert_eq!(args.stage.as_deref(), Some("users,posts"));
        assert_eq!(args.batch_size, Some(250));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["ferry", "--config", "custom.toml", "import"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["ferry", "--log-level", "debug", "import"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["ferry", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_status_lookup() {
        let cli = Cli::parse_from(["ferry", "status", "--lookup", "post:20"]);
        let Commands::Status(args) = cli.command else {
            panic!("expected status command");
        };
        assert_eq!(args.lookup.as_deref(), Some("post:20"));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["ferry", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
