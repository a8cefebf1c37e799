//! Publish toggle behavior.
//!
//! # Responsibility
//! - Track a nullable timestamp column as publish state with composable
//!   read filters.
//!
//! # Invariants
//! - Field NULL ⇔ unpublished; non-NULL ⇔ published.

use crate::behavior::{BehaviorError, BehaviorResult, ID_COLUMN};
use crate::query::Filter;
use crate::schema::{require_column, require_identifier, require_table, ConfigError};
use log::info;
use rusqlite::{Connection, OptionalExtension};

const DEFAULT_FIELD: &str = "published_at";

/// Validated publish-toggle configuration for one table.
///
/// Declaring the behavior again with a different field is just constructing
/// a new value; whichever value callers hold is the configuration in effect.
#[derive(Debug, Clone)]
pub struct Publishable {
    table: String,
    field: String,
}

impl Publishable {
    /// Declares the toggle on `table` over the default `published_at` field.
    pub fn declare(conn: &Connection, table: &str) -> Result<Self, ConfigError> {
        Self::declare_on(conn, table, DEFAULT_FIELD)
    }

    /// Declares the toggle on `table` over the given field. Fails fast when
    /// the field or identity column is absent.
    pub fn declare_on(conn: &Connection, table: &str, field: &str) -> Result<Self, ConfigError> {
        require_identifier(table)?;
        require_identifier(field)?;
        require_table(conn, table)?;
        require_column(conn, table, ID_COLUMN)?;
        require_column(conn, table, field)?;

        info!("event=behavior_declare module=publish status=ok table={table} field={field}");

        Ok(Self {
            table: table.to_string(),
            field: field.to_string(),
        })
    }

    /// Sets the field to the current timestamp and persists.
    pub fn publish(&self, conn: &Connection, id: i64) -> BehaviorResult<()> {
        let changed = conn.execute(
            &format!(
                "UPDATE {table} SET {field} = (strftime('%s', 'now') * 1000) WHERE {ID_COLUMN} = ?1;",
                table = self.table,
                field = self.field
            ),
            [id],
        )?;
        if changed == 0 {
            return Err(self.not_found(id));
        }
        Ok(())
    }

    /// Clears the field and persists.
    pub fn unpublish(&self, conn: &Connection, id: i64) -> BehaviorResult<()> {
        let changed = conn.execute(
            &format!(
                "UPDATE {table} SET {field} = NULL WHERE {ID_COLUMN} = ?1;",
                table = self.table,
                field = self.field
            ),
            [id],
        )?;
        if changed == 0 {
            return Err(self.not_found(id));
        }
        Ok(())
    }

    /// Returns whether the row's publish field is set.
    pub fn is_published(&self, conn: &Connection, id: i64) -> BehaviorResult<bool> {
        let value: Option<Option<i64>> = conn
            .query_row(
                &format!(
                    "SELECT {field} FROM {table} WHERE {ID_COLUMN} = ?1;",
                    field = self.field,
                    table = self.table
                ),
                [id],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(marker) => Ok(Self::published_value(marker)),
            None => Err(self.not_found(id)),
        }
    }

    /// Negation of [`Publishable::is_published`].
    pub fn is_unpublished(&self, conn: &Connection, id: i64) -> BehaviorResult<bool> {
        Ok(!self.is_published(conn, id)?)
    }

    /// Pure state check for a field value already loaded by the host.
    pub fn published_value(value: Option<i64>) -> bool {
        value.is_some()
    }

    /// Filter matching published rows (field non-NULL).
    pub fn published(&self) -> Filter {
        Filter::expr(format!("{} IS NOT NULL", self.field))
    }

    /// Filter matching unpublished rows (field NULL).
    pub fn unpublished(&self) -> Filter {
        Filter::expr(format!("{} IS NULL", self.field))
    }

    fn not_found(&self, id: i64) -> BehaviorError {
        BehaviorError::NotFound {
            table: self.table.clone(),
            id,
        }
    }
}
