//! Built-in markup dialects

use super::pipeline::TransformPipeline;
use super::rule::{rules_from_file, rules_from_toml, TransformRule};
use crate::domain::{MigrationError, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const BBCODE_RULES: &str = include_str!("../../../dialects/bbcode.toml");

/// Markup dialect of the legacy content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// phpBB / vBulletin style BBCode
    #[default]
    Bbcode,
    /// Content is already in target markup
    Passthrough,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Bbcode => "bbcode",
            Dialect::Passthrough => "passthrough",
        }
    }

    /// Rules of the dialect in declaration order
    pub fn rules(&self) -> Result<Vec<TransformRule>> {
        match self {
            Dialect::Bbcode => rules_from_toml(BBCODE_RULES),
            Dialect::Passthrough => Ok(Vec::new()),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bbcode" => Ok(Dialect::Bbcode),
            "passthrough" | "none" => Ok(Dialect::Passthrough),
            other => Err(MigrationError::Configuration(format!(
                "Invalid transform dialect: {other}. Expected 'bbcode' or 'passthrough'"
            ))),
        }
    }
}

/// Builds the pipeline for a dialect plus optional extra rules
///
/// Extra rules are appended after the dialect's rules and may order
/// themselves relative to them with `after`.
pub fn build_pipeline(dialect: Dialect, rules_file: Option<&Path>) -> Result<TransformPipeline> {
    let mut rules = dialect.rules()?;
    if let Some(path) = rules_file {
        let extra = rules_from_file(path)?;
        tracing::info!(
            dialect = %dialect,
            rules_file = %path.display(),
            extra_rules = extra.len(),
            "Loaded extra transform rules"
        );
        rules.extend(extra);
    }
    let pipeline = TransformPipeline::new(rules)?;
    tracing::debug!(
        dialect = %dialect,
        rules = ?pipeline.rule_names(),
        "Transform pipeline ready"
    );
    Ok(pipeline)
}
