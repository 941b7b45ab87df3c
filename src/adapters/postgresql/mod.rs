//! PostgreSQL integration
//!
//! A legacy forum database is read through [`PostgresSource`] with one
//! configured query per stage; the target platform is written through
//! [`PostgresTarget`]. Both share the pooled [`PgClient`].

pub mod client;
pub mod source;
pub mod target;

pub use client::{PgClient, PoolOptions};
pub use source::PostgresSource;
pub use target::{PostgresTarget, SCHEMA_SQL};
