//! Configuration management for ferry.
//!
//! A run is configured by a TOML file (`ferry.toml` by default) with support
//! for:
//! - Environment variable substitution (`${VAR_NAME}`) outside comment lines
//! - `FERRY_<SECTION>_<KEY>` environment overrides and a `.env` file
//! - Default values for optional settings
//! - Per-section validation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ferry::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("ferry.toml")?;
//! println!("Batch size: {}", config.import.batch_size);
//! println!("Dialect: {}", config.transform.dialect);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - log level
//! - [`SourceConfig`] - legacy database and per-stage queries
//! - [`TargetConfig`] - target database, uploads directory and base URL
//! - [`ImportConfig`] - batch size, stage selection and import toggles
//! - [`TransformConfig`] - markup dialect and extra rule file
//! - [`HooksConfig`] - post-commit hooks
//! - [`StateConfig`] - cursor checkpointing
//! - [`LoggingConfig`] - local JSON log files
//!
//! # Example Configuration
//!
//! ```toml
//! [source]
//! kind = "postgresql"
//! connection = "${FERRY_SOURCE_CONNECTION}"
//!
//! [source.queries.users]
//! fetch = "SELECT user_id AS key, user_id AS id, username, user_email AS email FROM phpbb_users WHERE user_id > $1 ORDER BY user_id LIMIT $2"
//! count = "SELECT COUNT(*) FROM phpbb_users"
//!
//! [target]
//! kind = "postgresql"
//! connection = "${FERRY_TARGET_CONNECTION}"
//! base_url = "https://forum.example.com"
//!
//! [import]
//! batch_size = 500
//!
//! [hooks]
//! topic_permalink = "/viewtopic.php?t={id}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, parse_stage_list, DEFAULT_CONFIG_FILE};
pub use schema::{
    ApplicationConfig, Environment, FerryConfig, HooksConfig, ImportConfig, LoggingConfig,
    SourceConfig, SourceKind, StageQuery, StateConfig, TargetConfig, TargetKind, TransformConfig,
    MAX_BATCH_SIZE,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
