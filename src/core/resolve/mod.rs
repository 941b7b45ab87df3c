//! In-content reference resolution
//!
//! - [`tokens`] - legacy reference token grammar
//! - [`resolver`] - inline and global resolution passes

pub mod resolver;
pub mod tokens;

pub use resolver::{
    GlobalPassReport, ReferenceOrigin, ReferenceResolver, Resolution, ResolveContext,
    ResolvePass, UnresolvedReference,
};
pub use tokens::{has_deferrable, scan, ReferenceKind, Token};
