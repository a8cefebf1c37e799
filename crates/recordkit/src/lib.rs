//! Reusable record behaviors for SQLite-backed models.
//!
//! Five independent behaviors attach declaratively to tables the host
//! application owns: obfuscated public identifiers, a publish toggle, URL
//! slugs, a soft-delete lifecycle with hooks, and dense position
//! sequencing. Each behavior is an explicit configuration value built by a
//! `declare` constructor that validates the schema up front, then operates
//! through the caller's connection.

pub mod behavior;
pub mod db;
pub mod logging;
pub mod query;
pub mod schema;

pub use behavior::hashid::{HashidOptions, Hashidable};
pub use behavior::publish::Publishable;
pub use behavior::sequence::Sequenced;
pub use behavior::slug::Sluggable;
pub use behavior::soft_delete::{NoHooks, SoftDeletable, SoftDeleteHooks, SoftDeleteOptions};
pub use behavior::{BehaviorError, BehaviorResult};
pub use db::{open_db, open_db_in_memory};
pub use logging::{default_log_level, init_logging, logging_status};
pub use query::{Filter, Order, SortDirection};
pub use schema::ConfigError;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
