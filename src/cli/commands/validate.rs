//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Ferry configuration file.

use crate::config::{load_config, FerryConfig, SecretString};
use crate::domain::Stage;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates every section before returning
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        print_summary(&config);
        Ok(0)
    }
}

fn print_summary(config: &FerryConfig) {
    println!("Configuration Summary:");
    println!("  Environment: {:?}", config.environment);
    println!("  Log Level: {}", config.application.log_level);
    println!(
        "  Source: {:?} {}",
        config.source.kind,
        host_part(config.source.connection.as_ref())
    );
    println!("  Source Queries: {}", config.source.queries.len());
    println!(
        "  Target: {:?} {}",
        config.target.kind,
        host_part(config.target.connection.as_ref())
    );
    println!("  Target Base URL: {}", config.target.base_url);
    println!("  Uploads Path: {}", config.target.uploads_path.display());
    println!(
        "  Stages: {}",
        Stage::ordered_subset(&config.import.stages)
            .iter()
            .map(Stage::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Batch Size: {}", config.import.batch_size);
    println!("  Fast Resume: {}", config.import.fast_resume);
    println!("  Merge Users By Email: {}", config.import.merge_users_by_email);
    println!("  Dialect: {}", config.transform.dialect);
    if let Some(rules) = &config.transform.rules_file {
        println!("  Rules File: {}", rules.display());
    }
    println!("  Checkpointing: {}", config.state.enable_checkpointing);
    println!();
}

/// Connection string without the credentials part
fn host_part(connection: Option<&SecretString>) -> String {
    connection
        .map(|c| {
            c.expose_secret()
                .as_str()
                .split('@')
                .next_back()
                .unwrap_or("***")
                .to_string()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_host_part_hides_credentials() {
        let secret = secret_string("postgresql://ferry:hunter2@db:5432/forum".to_string());
        assert_eq!(host_part(Some(&secret)), "db:5432/forum");
        assert_eq!(host_part(None), "");
    }

    #[tokio::test]
    async fn test_execute_reports_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[source]\nkind = \"memory\"\n[import]\nbatch_size = 0").unwrap();
        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn test_execute_accepts_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[source]\nkind = \"memory\"\n[target]\nkind = \"memory\"\nbase_url = \"https://forum.example.com\""
        )
        .unwrap();
        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }
}
