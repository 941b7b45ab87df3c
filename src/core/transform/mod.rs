//! Content transform pipeline
//!
//! Converts legacy markup into target markup with an ordered list of regex
//! rewrite rules. The rule set is chosen per source dialect; the engine never
//! branches on the legacy platform.
//!
//! - [`rule`] - rule definitions and TOML rule-set loading
//! - [`pipeline`] - ordering and application of rules
//! - [`dialects`] - built-in `bbcode` and `passthrough` rule sets
//!
//! # Example
//!
//! ```
//! use ferry::core::transform::{build_pipeline, Dialect};
//!
//! let pipeline = build_pipeline(Dialect::Bbcode, None).unwrap();
//! assert_eq!(pipeline.apply("[b]hello[/b]"), "**hello**");
//! ```

pub mod dialects;
pub mod pipeline;
pub mod rule;

pub use dialects::{build_pipeline, Dialect};
pub use pipeline::TransformPipeline;
pub use rule::{rules_from_file, rules_from_toml, RuleDefinition, TransformRule};
