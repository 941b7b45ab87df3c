//! PostgreSQL connection pool
//!
//! Both the legacy source and the target platform are reached through a
//! [`PgClient`]: a `deadpool-postgres` pool with optional TLS.

use crate::config::{SecretString, SourceConfig, TargetConfig};
use crate::domain::{MigrationError, Result};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::NoTls;

/// Pool sizing and connection behaviour
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_connections: usize,
    pub connection_timeout_seconds: u64,
    /// Zero disables the statement timeout
    pub statement_timeout_seconds: u64,
    pub ssl_mode: String,
}

impl From<&TargetConfig> for PoolOptions {
    fn from(config: &TargetConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            connection_timeout_seconds: config.connection_timeout_seconds,
            statement_timeout_seconds: config.statement_timeout_seconds,
            ssl_mode: config.ssl_mode.clone(),
        }
    }
}

impl From<&SourceConfig> for PoolOptions {
    fn from(config: &SourceConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            connection_timeout_seconds: 30,
            statement_timeout_seconds: 0,
            ssl_mode: config.ssl_mode.clone(),
        }
    }
}

/// Pooled PostgreSQL client
pub struct PgClient {
    pool: Pool,
    safe_connection: String,
}

impl PgClient {
    /// Create a new pool
    ///
    /// No connection is opened until the first query.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid or the TLS
    /// connector cannot be built.
    pub fn connect(connection: &SecretString, options: &PoolOptions) -> Result<Self> {
        let conn_str = connection.expose_secret().as_str();
        let mut pg_config: tokio_postgres::Config = conn_str.parse().map_err(|e| {
            MigrationError::Configuration(format!("Invalid PostgreSQL connection string: {e}"))
        })?;
        pg_config.ssl_mode(ssl_mode(&options.ssl_mode));
        if options.statement_timeout_seconds > 0 {
            pg_config.options(&format!(
                "-c statement_timeout={}",
                options.statement_timeout_seconds * 1000
            ));
        }

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let manager = match tls_connector(&options.ssl_mode)? {
            Some(tls) => Manager::from_config(pg_config, tls, manager_config),
            None => Manager::from_config(pg_config, NoTls, manager_config),
        };

        let timeout = Some(Duration::from_secs(options.connection_timeout_seconds));
        let pool = Pool::builder(manager)
            .max_size(options.max_connections)
            .wait_timeout(timeout)
            .create_timeout(timeout)
            .recycle_timeout(timeout)
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .map_err(|e| MigrationError::Database(format!("Failed to create connection pool: {e}")))?;

        Ok(Self {
            pool,
            safe_connection: redact_connection_string(conn_str),
        })
    }

    /// Get a connection from the pool
    ///
    /// # Errors
    ///
    /// Returns the pool error when no connection can be obtained in time.
    pub async fn get(&self) -> std::result::Result<Object, deadpool_postgres::PoolError> {
        self.pool.get().await
    }

    /// Test the connection
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Database` when the server cannot be reached.
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get().await.map_err(|e| {
            MigrationError::Database(format!(
                "Failed to connect to {}: {e}",
                self.safe_connection
            ))
        })?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| MigrationError::Database(format!("Connection test failed: {e}")))?;

        tracing::info!(connection = %self.safe_connection, "PostgreSQL connection test successful");
        Ok(())
    }

    /// Runs an idempotent schema script
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Database` if the script fails.
    pub async fn apply_schema(&self, sql: &str) -> Result<()> {
        let client = self.get().await.map_err(|e| {
            MigrationError::Database(format!("Failed to get connection from pool: {e}"))
        })?;
        client
            .batch_execute(sql)
            .await
            .map_err(|e| MigrationError::Database(format!("Failed to execute migration: {e}")))?;

        tracing::info!("PostgreSQL schema initialized successfully");
        Ok(())
    }

    /// Connection string without credentials
    pub fn connection_string_safe(&self) -> &str {
        &self.safe_connection
    }

    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}

fn ssl_mode(mode: &str) -> SslMode {
    match mode {
        "disable" => SslMode::Disable,
        "require" | "verify-ca" | "verify-full" => SslMode::Require,
        _ => SslMode::Prefer,
    }
}

/// TLS connector for an SSL mode, `None` when TLS is disabled
fn tls_connector(mode: &str) -> Result<Option<MakeTlsConnector>> {
    if mode == "disable" {
        return Ok(None);
    }
    let mut builder = TlsConnector::builder();
    match mode {
        "verify-full" => {}
        "verify-ca" => {
            builder.danger_accept_invalid_hostnames(true);
        }
        _ => {
            builder.danger_accept_invalid_certs(true);
        }
    }
    let connector = builder
        .build()
        .map_err(|e| MigrationError::Configuration(format!("Failed to build TLS connector: {e}")))?;
    Ok(Some(MakeTlsConnector::new(connector)))
}

fn redact_connection_string(conn_str: &str) -> String {
    match url::Url::parse(conn_str) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            url.to_string()
        }
        Err(_) => conn_str
            .rsplit('@')
            .next()
            .map(|host| format!("postgresql://***@{host}"))
            .unwrap_or_else(|| "postgresql://***".to_string()),
    }
}
