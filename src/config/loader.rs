//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::FerryConfig;
use super::secret::secret_string;
use crate::domain::errors::MigrationError;
use crate::domain::result::Result;
use crate::domain::Stage;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "ferry.toml";

fn env_placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("env placeholder pattern is valid")
    })
}

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Loads a `.env` file from the working directory when one exists
/// 2. Reads the TOML file
/// 3. Performs environment variable substitution (${VAR} syntax)
/// 4. Parses the TOML into FerryConfig
/// 5. Applies environment variable overrides (FERRY_* prefix)
/// 6. Validates the configuration
///
/// # Errors
///
/// Returns `MigrationError::Configuration` if the file cannot be read, a
/// referenced variable is unset, parsing fails or validation fails.
///
/// # Examples
///
/// ```no_run
/// use ferry::config::load_config;
///
/// let config = load_config("ferry.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<FerryConfig> {
    let path = path.as_ref();

    // A missing .env is not an error
    let _ = dotenvy::dotenv();

    if !path.exists() {
        return Err(MigrationError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        MigrationError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: FerryConfig = toml::from_str(&contents)
        .map_err(|e| MigrationError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        MigrationError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied unchanged.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = env_placeholder();
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let processed = re.replace_all(line, |cap: &regex::Captures<'_>| {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    cap[0].to_string()
                }
            }
        });
        lines.push(processed.into_owned());
    }

    if !missing_vars.is_empty() {
        return Err(MigrationError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    match std::env::var(name) {
        Ok(val) => val.trim().parse().map(Some).map_err(|_| {
            MigrationError::Configuration(format!("{name} must be true or false, got '{val}'"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(val) => val.trim().parse().map(Some).map_err(|_| {
            MigrationError::Configuration(format!("{name} must be a number, got '{val}'"))
        }),
        Err(_) => Ok(None),
    }
}

/// Applies environment variable overrides using FERRY_* prefix
///
/// Environment variables follow the pattern: FERRY_<SECTION>_<KEY>
/// For example: FERRY_TARGET_CONNECTION, FERRY_IMPORT_BATCH_SIZE
fn apply_env_overrides(config: &mut FerryConfig) -> Result<()> {
    if let Ok(val) = std::env::var("FERRY_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    if let Ok(val) = std::env::var("FERRY_SOURCE_CONNECTION") {
        config.source.connection = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("FERRY_TARGET_CONNECTION") {
        config.target.connection = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("FERRY_TARGET_BASE_URL") {
        config.target.base_url = val;
    }
    if let Ok(val) = std::env::var("FERRY_TARGET_UPLOADS_PATH") {
        config.target.uploads_path = PathBuf::from(val);
    }
    if let Some(max) = env_number("FERRY_TARGET_MAX_CONNECTIONS")? {
        config.target.max_connections = max;
    }

    if let Some(size) = env_number("FERRY_IMPORT_BATCH_SIZE")? {
        config.import.batch_size = size;
    }
    if let Ok(val) = std::env::var("FERRY_IMPORT_STAGES") {
        config.import.stages = parse_stage_list(&val).map_err(MigrationError::Configuration)?;
    }
    if let Some(enabled) = env_bool("FERRY_IMPORT_FAST_RESUME")? {
        config.import.fast_resume = enabled;
    }
    if let Some(enabled) = env_bool("FERRY_IMPORT_MERGE_USERS_BY_EMAIL")? {
        config.import.merge_users_by_email = enabled;
    }
    if let Ok(val) = std::env::var("FERRY_IMPORT_ATTACHMENTS_PATH") {
        config.import.attachments_path = Some(PathBuf::from(val));
    }
    if let Ok(val) = std::env::var("FERRY_IMPORT_AVATARS_PATH") {
        config.import.avatars_path = Some(PathBuf::from(val));
    }

    if let Ok(val) = std::env::var("FERRY_TRANSFORM_DIALECT") {
        config.transform.dialect = val;
    }
    if let Ok(val) = std::env::var("FERRY_TRANSFORM_RULES_FILE") {
        config.transform.rules_file = Some(PathBuf::from(val));
    }

    if let Some(enabled) = env_bool("FERRY_STATE_ENABLE_CHECKPOINTING")? {
        config.state.enable_checkpointing = enabled;
    }

    if let Some(enabled) = env_bool("FERRY_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = enabled;
    }
    if let Ok(val) = std::env::var("FERRY_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("FERRY_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}

/// Parses a comma separated stage list such as `users,topics`
///
/// # Errors
///
/// Returns the message of the first unknown stage name
pub fn parse_stage_list(input: &str) -> std::result::Result<Vec<Stage>, String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{SourceKind, TargetKind};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[source]
kind = "memory"

[target]
kind = "memory"
"#;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("FERRY_TEST_SUBST_VAR", "test_value");
        let input = "connection = \"${FERRY_TEST_SUBST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "connection = \"test_value\"");
        std::env::remove_var("FERRY_TEST_SUBST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("FERRY_TEST_MISSING_VAR");
        let input = "connection = \"${FERRY_TEST_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("FERRY_TEST_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_skips_comments() {
        std::env::remove_var("FERRY_TEST_COMMENTED_VAR");
        let input = "# connection = \"${FERRY_TEST_COMMENTED_VAR}\"\nbatch_size = 10";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent-ferry.toml");
        assert!(matches!(result, Err(MigrationError::Configuration(_))));
    }

    #[test]
    fn test_load_config_minimal_uses_defaults() {
        let file = write_config(MINIMAL);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.source.kind, SourceKind::Memory);
        assert_eq!(config.target.kind, TargetKind::Memory);
        assert_eq!(config.import.batch_size, 500);
        assert!(config.import.fast_resume);
        assert!(config.state.enable_checkpointing);
        assert_eq!(config.transform.dialect, "bbcode");
        assert!(config.hooks.tags);
    }

    #[test]
    fn test_load_config_with_queries() {
        let file = write_config(
            r#"
[source]
kind = "memory"

[source.queries.users]
fetch = "SELECT user_id AS key, user_id AS id, username FROM phpbb_users WHERE user_id > $1 ORDER BY user_id LIMIT $2"
count = "SELECT COUNT(*) FROM phpbb_users"

[target]
kind = "memory"

[import]
batch_size = 250
stages = ["topics", "users"]
"#,
        );
        let config = load_config(file.path()).unwrap();

        let users = &config.source.queries[&Stage::Users];
        assert!(users.fetch.contains("phpbb_users"));
        assert!(users.count.is_some());
        assert_eq!(config.import.batch_size, 250);
        assert_eq!(config.import.stages, vec![Stage::Topics, Stage::Users]);
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let file = write_config(
            r#"
[source]
kind = "memory"

[target]
kind = "memory"

[import]
batch_size = 20000
"#,
        );
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("import.batch_size"));
    }

    #[test]
    fn test_parse_stage_list() {
        assert_eq!(
            parse_stage_list("users, private-messages").unwrap(),
            vec![Stage::Users, Stage::PrivateMessages]
        );
        assert!(parse_stage_list("users,threads").is_err());
        assert!(parse_stage_list("").unwrap().is_empty());
    }
}
