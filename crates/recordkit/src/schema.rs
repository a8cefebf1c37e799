//! Schema introspection and declaration-time validation.
//!
//! # Responsibility
//! - Verify at behavior declaration time that configured tables and columns
//!   exist in the host schema.
//! - Reject unsafe identifiers before they are interpolated into SQL text.
//!
//! # Invariants
//! - `ConfigError` is raised at declaration time only, never by runtime
//!   operations.
//! - Every identifier a behavior embeds in SQL has passed
//!   `require_identifier`.

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

static IDENTIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles"));

/// Declaration-time configuration error.
///
/// Behaviors fail fast when declared against a table or column that does not
/// exist, so misconfiguration surfaces at registration rather than during a
/// later write.
#[derive(Debug)]
pub enum ConfigError {
    MissingTable {
        table: String,
    },
    MissingColumn {
        table: String,
        column: String,
    },
    InvalidIdentifier {
        identifier: String,
    },
    /// Encoding backend could not be constructed from the declared options.
    Codec {
        message: String,
    },
    /// Introspection query itself failed.
    Db(rusqlite::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTable { table } => {
                write!(f, "table `{table}` does not exist in the database")
            }
            Self::MissingColumn { table, column } => {
                write!(f, "column `{column}` does not exist on table `{table}`")
            }
            Self::InvalidIdentifier { identifier } => {
                write!(f, "`{identifier}` is not a valid SQL identifier")
            }
            Self::Codec { message } => write!(f, "codec setup failed: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for ConfigError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(value)
    }
}

/// Rejects identifiers that cannot be safely embedded in SQL text.
pub fn require_identifier(identifier: &str) -> Result<(), ConfigError> {
    if IDENTIFIER_PATTERN.is_match(identifier) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

/// Checks that `table` exists.
pub fn require_table(conn: &Connection, table: &str) -> Result<(), ConfigError> {
    let present: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
        [table],
        |row| row.get(0),
    )?;

    if present {
        Ok(())
    } else {
        Err(ConfigError::MissingTable {
            table: table.to_string(),
        })
    }
}

/// Returns whether `column` exists on `table`.
pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, ConfigError> {
    let present: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2);",
        [table, column],
        |row| row.get(0),
    )?;
    Ok(present)
}

/// Checks that `column` exists on `table`.
pub fn require_column(conn: &Connection, table: &str, column: &str) -> Result<(), ConfigError> {
    if column_exists(conn, table, column)? {
        Ok(())
    } else {
        Err(ConfigError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::require_identifier;

    #[test]
    fn plain_identifiers_pass() {
        require_identifier("deleted_at").unwrap();
        require_identifier("_position2").unwrap();
    }

    #[test]
    fn injection_shaped_identifiers_fail() {
        require_identifier("deleted_at; DROP TABLE posts").unwrap_err();
        require_identifier("name`").unwrap_err();
        require_identifier("").unwrap_err();
        require_identifier("2fast").unwrap_err();
    }
}
