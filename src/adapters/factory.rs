//! Adapter factory
//!
//! Creates the configured source and target adapters.

use crate::adapters::postgresql::{PgClient, PoolOptions, PostgresSource, PostgresTarget};
use crate::adapters::source::{MemorySource, SourceAdapter};
use crate::adapters::target::{CursorStorage, MemoryTarget, TargetRepository};
use crate::config::{FerryConfig, SecretString, SourceKind, TargetKind};
use crate::domain::{MigrationError, Result};
use std::sync::Arc;

fn required_connection<'a>(name: &str, connection: Option<&'a SecretString>) -> Result<&'a SecretString> {
    connection.ok_or_else(|| {
        MigrationError::Configuration(format!("{name} is required for kind = 'postgresql'"))
    })
}

/// Create the source adapter based on the configuration
///
/// # Errors
///
/// Returns an error if the connection string is invalid or the source
/// database cannot be reached.
pub async fn create_source(config: &FerryConfig) -> Result<Arc<dyn SourceAdapter>> {
    match config.source.kind {
        SourceKind::Memory => {
            tracing::warn!("Using an empty in-memory source, no rows will be imported");
            Ok(Arc::new(MemorySource::new()))
        }
        SourceKind::PostgreSQL => {
            let connection = required_connection("source.connection", config.source.connection.as_ref())?;

            tracing::info!(stages = config.source.queries.len(), "Creating PostgreSQL source");
            let client = Arc::new(PgClient::connect(connection, &PoolOptions::from(&config.source))?);
            client.test_connection().await?;

            Ok(Arc::new(PostgresSource::new(client, config.source.queries.clone())))
        }
    }
}

/// Create the target repository and the cursor storage from the same client
///
/// # Errors
///
/// Returns an error if the target cannot be reached or its schema cannot
/// be applied.
pub async fn create_target(
    config: &FerryConfig,
) -> Result<(Arc<dyn TargetRepository>, Arc<dyn CursorStorage>)> {
    match config.target.kind {
        TargetKind::Memory => {
            tracing::warn!("Using an in-memory target, imported data is discarded at exit");
            let target = Arc::new(MemoryTarget::new().with_base_url(config.target.base_url.clone()));
            Ok((
                target.clone() as Arc<dyn TargetRepository>,
                target as Arc<dyn CursorStorage>,
            ))
        }
        TargetKind::PostgreSQL => {
            let connection = required_connection("target.connection", config.target.connection.as_ref())?;

            tracing::info!("Creating PostgreSQL target and cursor storage");
            let client = Arc::new(PgClient::connect(connection, &PoolOptions::from(&config.target))?);
            client.test_connection().await?;

            let target = Arc::new(PostgresTarget::new(
                client,
                config.target.base_url.clone(),
                config.target.uploads_path.clone(),
            ));
            target.ensure_schema().await?;

            Ok((
                target.clone() as Arc<dyn TargetRepository>,
                target as Arc<dyn CursorStorage>,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use crate::domain::Stage;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn memory_config() -> FerryConfig {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[source]\nkind = \"memory\"\n\n[target]\nkind = \"memory\"\n")
            .unwrap();
        load_config(file.path()).unwrap()
    }

    #[tokio::test]
    async fn test_memory_adapters() {
        let config = memory_config();
        let source = create_source(&config).await.unwrap();
        let (target, cursors) = create_target(&config).await.unwrap();

        assert_eq!(source.name(), "memory");
        assert_eq!(source.count(Stage::Users).await.unwrap(), 0);
        assert_eq!(target.name(), "memory");
        assert!(cursors.load_all_cursors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_postgresql_source_without_connection_is_a_config_error() {
        let mut config = memory_config();
        config.source.kind = SourceKind::PostgreSQL;
        let result = create_source(&config).await;
        assert!(matches!(result, Err(MigrationError::Configuration(_))));
    }
}
