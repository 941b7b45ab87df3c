//! Transform rules and rule-set files
//!
//! A rule is a regex rewrite with a name and explicit ordering constraints.
//! Rule sets are written in TOML:
//!
//! ```toml
//! [[rules]]
//! name = "bold"
//! pattern = '(?is)\[b\](.*?)\[/b\]'
//! replacement = "**${1}**"
//! after = ["code_blocks"]
//! ```

use crate::domain::{MigrationError, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

/// Rule as written in a rule-set file
#[derive(Debug, Clone, Deserialize)]
pub struct RuleDefinition {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub replacement: String,
    /// Names of rules that must run before this one
    #[serde(default)]
    pub after: Vec<String>,
    /// Shield the rewritten text from every later rule
    #[serde(default)]
    pub protect: bool,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<RuleDefinition>,
}

/// Compiled rewrite rule
#[derive(Debug, Clone)]
pub struct TransformRule {
    pub name: String,
    pub pattern: Regex,
    /// Replacement with `$1` / `${name}` capture expansion
    pub replacement: String,
    pub after: Vec<String>,
    pub protect: bool,
}

impl TransformRule {
    /// Compiles a rule without ordering constraints
    pub fn new(name: impl Into<String>, pattern: &str, replacement: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|e| {
            MigrationError::Configuration(format!("Invalid pattern in rule '{name}': {e}"))
        })?;
        Ok(Self {
            name,
            pattern,
            replacement: replacement.into(),
            after: Vec::new(),
            protect: false,
        })
    }

    /// Requires `rule` to run before this one
    pub fn after(mut self, rule: impl Into<String>) -> Self {
        self.after.push(rule.into());
        self
    }

    /// Shields the rewritten text from later rules
    pub fn protected(mut self) -> Self {
        self.protect = true;
        self
    }

    pub fn from_definition(def: RuleDefinition) -> Result<Self> {
        if def.name.trim().is_empty() {
            return Err(MigrationError::Configuration(
                "Transform rule name cannot be empty".to_string(),
            ));
        }
        let mut rule = Self::new(def.name, &def.pattern, def.replacement)?;
        rule.after = def.after;
        rule.protect = def.protect;
        Ok(rule)
    }
}

/// Parses a TOML rule set
pub fn rules_from_toml(content: &str) -> Result<Vec<TransformRule>> {
    let file: RuleFile = toml::from_str(content)
        .map_err(|e| MigrationError::Configuration(format!("Failed to parse rule set: {e}")))?;
    file.rules
        .into_iter()
        .map(TransformRule::from_definition)
        .collect()
}

/// Reads a TOML rule set from disk
pub fn rules_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<TransformRule>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        MigrationError::Configuration(format!(
            "Failed to read rule set {}: {e}",
            path.display()
        ))
    })?;
    rules_from_toml(&content)
}
