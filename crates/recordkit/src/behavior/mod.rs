//! Record behaviors attachable to host-owned tables.
//!
//! # Responsibility
//! - Define the shared runtime error contract for behavior operations.
//! - Group the five behaviors: identifier obfuscation, publish toggle, slug
//!   generation, soft-delete lifecycle, position sequencing.
//!
//! # Invariants
//! - Behaviors never call each other; each operates independently through
//!   the caller's connection.
//! - Rows are keyed by an `id INTEGER PRIMARY KEY` column, validated at
//!   declaration time.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod hashid;
pub mod publish;
pub mod sequence;
pub mod slug;
pub mod soft_delete;

/// Name of the identity column every behavior keys rows by.
pub const ID_COLUMN: &str = "id";

pub type BehaviorResult<T> = Result<T, BehaviorError>;

/// Runtime error for behavior operations.
///
/// Declaration-time problems are reported separately as
/// [`crate::schema::ConfigError`]; this enum covers failures surfaced while
/// operating on rows.
#[derive(Debug)]
pub enum BehaviorError {
    /// SQLite transport or constraint failure from the underlying write.
    Sqlite(rusqlite::Error),
    /// No row with the given identity matched the operation.
    NotFound { table: String, id: i64 },
    /// A lifecycle hook refused the transition; the chain was aborted.
    HookAborted { hook: &'static str, message: String },
    /// A position mutation was requested on a sequencer declared without
    /// automatic maintenance.
    SequencingDisabled { table: String },
}

impl Display for BehaviorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::NotFound { table, id } => write!(f, "no row with id {id} in `{table}`"),
            Self::HookAborted { hook, message } => {
                write!(f, "hook `{hook}` aborted the transition: {message}")
            }
            Self::SequencingDisabled { table } => write!(
                f,
                "position maintenance is disabled for `{table}`; only read ordering is available"
            ),
        }
    }
}

impl Error for BehaviorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for BehaviorError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
