//! Ordered content transform pipeline
//!
//! The pipeline converts legacy markup into target markup by applying its
//! rules in a fixed order. It runs exactly once per piece of content, when
//! the entity is first persisted.

use super::rule::TransformRule;
use crate::domain::{MigrationError, Result};
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::sync::OnceLock;

const PLACEHOLDER_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("\u{E000}(\\d+)\u{E001}").expect("placeholder pattern is valid"))
}

/// Ordered list of rewrite rules
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    rules: Vec<TransformRule>,
}

impl TransformPipeline {
    /// Builds a pipeline, ordering rules by their `after` constraints
    ///
    /// The sort is stable: rules keep their given order unless a constraint
    /// forces one later.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Configuration` for duplicate rule names,
    /// constraints naming unknown rules and cyclic constraints.
    pub fn new(rules: Vec<TransformRule>) -> Result<Self> {
        Ok(Self {
            rules: order_rules(rules)?,
        })
    }

    /// Pipeline without rules
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Rule names in execution order
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rewrites raw legacy content
    pub fn apply(&self, raw: &str) -> String {
        if self.rules.is_empty() {
            return raw.to_string();
        }

        // Placeholder characters from the source would collide with ours
        let mut text: String = raw
            .chars()
            .filter(|c| *c != PLACEHOLDER_OPEN && *c != PLACEHOLDER_CLOSE)
            .collect();
        let mut protected: Vec<String> = Vec::new();

        for rule in &self.rules {
            if rule.protect {
                text = rule
                    .pattern
                    .replace_all(&text, |caps: &Captures<'_>| {
                        let mut expanded = String::new();
                        caps.expand(&rule.replacement, &mut expanded);
                        protected.push(expanded);
                        format!(
                            "{PLACEHOLDER_OPEN}{}{PLACEHOLDER_CLOSE}",
                            protected.len() - 1
                        )
                    })
                    .into_owned();
            } else {
                text = rule
                    .pattern
                    .replace_all(&text, rule.replacement.as_str())
                    .into_owned();
            }
        }

        if protected.is_empty() {
            return text.trim().to_string();
        }
        placeholder_pattern()
            .replace_all(&text, |caps: &Captures<'_>| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| protected.get(index))
                    .cloned()
                    .unwrap_or_default()
            })
            .trim()
            .to_string()
    }
}

fn order_rules(rules: Vec<TransformRule>) -> Result<Vec<TransformRule>> {
    let mut seen = HashSet::new();
    for rule in &rules {
        if !seen.insert(rule.name.clone()) {
            return Err(MigrationError::Configuration(format!(
                "Duplicate transform rule '{}'",
                rule.name
            )));
        }
    }
    for rule in &rules {
        if let Some(unknown) = rule.after.iter().find(|dep| !seen.contains(*dep)) {
            return Err(MigrationError::Configuration(format!(
                "Transform rule '{}' must run after unknown rule '{unknown}'",
                rule.name
            )));
        }
    }

    let mut pending: Vec<Option<TransformRule>> = rules.into_iter().map(Some).collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut ordered = Vec::with_capacity(pending.len());

    while ordered.len() < pending.len() {
        let next = pending.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|rule| rule.after.iter().all(|dep| placed.contains(dep)))
        });
        let Some(index) = next else {
            let stuck: Vec<&str> = pending
                .iter()
                .flatten()
                .map(|rule| rule.name.as_str())
                .collect();
            return Err(MigrationError::Configuration(format!(
                "Cyclic ordering constraints between transform rules: {}",
                stuck.join(", ")
            )));
        };
        if let Some(rule) = pending[index].take() {
            placed.insert(rule.name.clone());
            ordered.push(rule);
        }
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, pattern: &str, replacement: &str) -> TransformRule {
        TransformRule::new(name, pattern, replacement).unwrap()
    }

    #[test]
    fn test_stable_order_without_constraints() {
        let pipeline = TransformPipeline::new(vec![
            rule("a", "a", "b"),
            rule("b", "b", "c"),
            rule("c", "c", "d"),
        ])
        .unwrap();
        assert_eq!(pipeline.rule_names(), vec!["a", "b", "c"]);
        assert_eq!(pipeline.apply("a"), "d");
    }

    #[test]
    fn test_constraints_reorder_rules() {
        let pipeline = TransformPipeline::new(vec![
            rule("escape", "<", "&lt;").after("extract"),
            rule("other", "x", "y"),
            rule("extract", "z", "w"),
        ])
        .unwrap();
        assert_eq!(pipeline.rule_names(), vec!["other", "extract", "escape"]);
    }

    #[test]
    fn test_unknown_constraint_rejected() {
        let err = TransformPipeline::new(vec![rule("a", "a", "b").after("missing")]).unwrap_err();
        assert!(err.to_string().contains("unknown rule 'missing'"));
    }

    #[test]
    fn test_cycle_rejected() {
        let err = TransformPipeline::new(vec![
            rule("a", "a", "b").after("b"),
            rule("b", "b", "c").after("a"),
        ])
        .unwrap_err();
        assert!(matches!(err, MigrationError::Configuration(_)));
        assert!(err.to_string().contains("Cyclic"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = TransformPipeline::new(vec![rule("a", "a", "b"), rule("a", "c", "d")]).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_protected_output_skips_later_rules() {
        let pipeline = TransformPipeline::new(vec![
            rule("code", r"(?s)\[code\](.*?)\[/code\]", "`${1}`").protected(),
            rule("escape", "<", "&lt;").after("code"),
        ])
        .unwrap();
        assert_eq!(pipeline.apply("<b> [code]<i>[/code]"), "&lt;b> `<i>`");
    }

    #[test]
    fn test_source_placeholder_characters_are_stripped() {
        let pipeline = TransformPipeline::new(vec![
            rule("code", r"(?s)\[code\](.*?)\[/code\]", "${1}").protected(),
        ])
        .unwrap();
        assert_eq!(pipeline.apply("a\u{E000}0\u{E001}b [code]c[/code]"), "a0b c");
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let pipeline = TransformPipeline::empty();
        assert_eq!(pipeline.apply("  [b]x[/b]  "), "  [b]x[/b]  ");
    }
}
