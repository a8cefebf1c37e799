//! Soft-delete lifecycle behavior.
//!
//! # Responsibility
//! - Replace hard deletion with a nullable timestamp marker, plus restore,
//!   lifecycle hooks and visibility scopes.
//! - Route bulk destruction through the same per-row transition.
//!
//! # Invariants
//! - The configured field is NULL ⇔ the row is active; non-NULL ⇔ soft
//!   deleted. Physical deletion bypasses the field entirely.
//! - Hooks run in fixed order: before, persist, after-gated-on-success. A
//!   failing hook aborts the chain.
//! - Repeating `soft_delete` on an already-deleted row re-runs hooks but
//!   preserves the original deletion timestamp.

use crate::behavior::{BehaviorError, BehaviorResult, ID_COLUMN};
use crate::query::Filter;
use crate::schema::{require_column, require_identifier, require_table, ConfigError};
use log::info;
use rusqlite::{params_from_iter, Connection, OptionalExtension};

const DEFAULT_FIELD: &str = "deleted_at";
const DEFAULT_TOUCH_FIELD: &str = "updated_at";

/// Declaration options for [`SoftDeletable`]. Unset options take defaults:
/// field `deleted_at`, touch enabled against `updated_at`.
#[derive(Debug, Clone, Copy)]
pub struct SoftDeleteOptions<'a> {
    pub field: Option<&'a str>,
    pub touch: bool,
    pub touch_field: Option<&'a str>,
}

impl Default for SoftDeleteOptions<'_> {
    fn default() -> Self {
        Self {
            field: None,
            touch: true,
            touch_field: None,
        }
    }
}

/// Lifecycle hooks observed by soft-delete and restore transitions.
///
/// Every method defaults to a no-op. A hook returning `Err` aborts the
/// enclosing transition; after-hooks run only when the persistence write
/// succeeded.
pub trait SoftDeleteHooks {
    fn before_soft_delete(&mut self, conn: &Connection, id: i64) -> Result<(), String> {
        let _ = (conn, id);
        Ok(())
    }

    fn after_soft_delete(&mut self, conn: &Connection, id: i64) -> Result<(), String> {
        let _ = (conn, id);
        Ok(())
    }

    fn before_restore(&mut self, conn: &Connection, id: i64) -> Result<(), String> {
        let _ = (conn, id);
        Ok(())
    }

    fn after_restore(&mut self, conn: &Connection, id: i64) -> Result<(), String> {
        let _ = (conn, id);
        Ok(())
    }
}

/// Hook set that observes nothing.
pub struct NoHooks;

impl SoftDeleteHooks for NoHooks {}

/// Validated soft-delete configuration for one table.
#[derive(Debug, Clone)]
pub struct SoftDeletable {
    table: String,
    field: String,
    touch: bool,
    touch_field: String,
}

impl SoftDeletable {
    /// Declares soft deletion on `table` with default options.
    pub fn declare(conn: &Connection, table: &str) -> Result<Self, ConfigError> {
        Self::declare_with(conn, table, SoftDeleteOptions::default())
    }

    /// Declares soft deletion on `table` marking the given field.
    pub fn declare_on(conn: &Connection, table: &str, field: &str) -> Result<Self, ConfigError> {
        Self::declare_with(
            conn,
            table,
            SoftDeleteOptions {
                field: Some(field),
                ..SoftDeleteOptions::default()
            },
        )
    }

    /// Declares soft deletion on `table` with explicit options.
    ///
    /// Fails fast when the marker field, the identity column, or (with touch
    /// enabled) the touch column is absent from the table.
    pub fn declare_with(
        conn: &Connection,
        table: &str,
        options: SoftDeleteOptions<'_>,
    ) -> Result<Self, ConfigError> {
        let field = options.field.unwrap_or(DEFAULT_FIELD);
        let touch_field = options.touch_field.unwrap_or(DEFAULT_TOUCH_FIELD);

        require_identifier(table)?;
        require_identifier(field)?;
        require_table(conn, table)?;
        require_column(conn, table, ID_COLUMN)?;
        require_column(conn, table, field)?;
        if options.touch {
            require_identifier(touch_field)?;
            require_column(conn, table, touch_field)?;
        }

        info!(
            "event=behavior_declare module=soft_delete status=ok table={table} field={field} touch={}",
            options.touch
        );

        Ok(Self {
            table: table.to_string(),
            field: field.to_string(),
            touch: options.touch,
            touch_field: touch_field.to_string(),
        })
    }

    /// Soft-deletes one row without observers.
    pub fn soft_delete(&self, conn: &Connection, id: i64) -> BehaviorResult<()> {
        self.soft_delete_with(conn, id, &mut NoHooks)
    }

    /// Soft-deletes one row, running the hook chain around the write.
    ///
    /// The marker is set with `COALESCE`, so a second call on an already
    /// deleted row keeps the original deletion timestamp while the hooks
    /// still fire.
    pub fn soft_delete_with<H: SoftDeleteHooks>(
        &self,
        conn: &Connection,
        id: i64,
        hooks: &mut H,
    ) -> BehaviorResult<()> {
        hooks
            .before_soft_delete(conn, id)
            .map_err(|message| BehaviorError::HookAborted {
                hook: "before_soft_delete",
                message,
            })?;

        let mut sql = format!(
            "UPDATE {table} SET {field} = COALESCE({field}, (strftime('%s', 'now') * 1000))",
            table = self.table,
            field = self.field,
        );
        self.push_touch(&mut sql);
        sql.push_str(&format!(" WHERE {ID_COLUMN} = ?1;"));

        let changed = conn.execute(&sql, [id])?;
        if changed == 0 {
            return Err(self.not_found(id));
        }

        hooks
            .after_soft_delete(conn, id)
            .map_err(|message| BehaviorError::HookAborted {
                hook: "after_soft_delete",
                message,
            })
    }

    /// Restores one soft-deleted row without observers.
    pub fn restore(&self, conn: &Connection, id: i64) -> BehaviorResult<()> {
        self.restore_with(conn, id, &mut NoHooks)
    }

    /// Restores one row, running the hook chain around the write.
    pub fn restore_with<H: SoftDeleteHooks>(
        &self,
        conn: &Connection,
        id: i64,
        hooks: &mut H,
    ) -> BehaviorResult<()> {
        hooks
            .before_restore(conn, id)
            .map_err(|message| BehaviorError::HookAborted {
                hook: "before_restore",
                message,
            })?;

        let mut sql = format!(
            "UPDATE {table} SET {field} = NULL",
            table = self.table,
            field = self.field,
        );
        self.push_touch(&mut sql);
        sql.push_str(&format!(" WHERE {ID_COLUMN} = ?1;"));

        let changed = conn.execute(&sql, [id])?;
        if changed == 0 {
            return Err(self.not_found(id));
        }

        hooks
            .after_restore(conn, id)
            .map_err(|message| BehaviorError::HookAborted {
                hook: "after_restore",
                message,
            })
    }

    /// Physically deletes one row. Bypasses hooks and the marker field.
    pub fn really_delete(&self, conn: &Connection, id: i64) -> BehaviorResult<()> {
        let changed = conn.execute(
            &format!(
                "DELETE FROM {table} WHERE {ID_COLUMN} = ?1;",
                table = self.table
            ),
            [id],
        )?;
        if changed == 0 {
            return Err(self.not_found(id));
        }
        Ok(())
    }

    /// Returns whether the row's marker field is set.
    pub fn is_deleted(&self, conn: &Connection, id: i64) -> BehaviorResult<bool> {
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
            Some(marker) => Ok(Self::deleted_value(marker)),
            None => Err(self.not_found(id)),
        }
    }

    /// Pure marker check for a field value already loaded by the host.
    pub fn deleted_value(value: Option<i64>) -> bool {
        value.is_some()
    }

    /// Returns whether the row is physically gone from the table.
    pub fn is_really_deleted(&self, conn: &Connection, id: i64) -> BehaviorResult<bool> {
        let present: bool = conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {table} WHERE {ID_COLUMN} = ?1);",
                table = self.table
            ),
            [id],
            |row| row.get(0),
        )?;
        Ok(!present)
    }

    /// Filter matching rows whose marker field is NULL.
    pub fn active(&self) -> Filter {
        Filter::expr(format!("{} IS NULL", self.field))
    }

    /// Alias of [`SoftDeletable::active`].
    pub fn without_deleted(&self) -> Filter {
        self.active()
    }

    /// Filter matching rows whose marker field is set.
    pub fn soft_deleted(&self) -> Filter {
        Filter::expr(format!("{} IS NOT NULL", self.field))
    }

    /// Soft-deletes every row matched by `filter`, routing each through the
    /// per-row transition (hooks included). Returns the number of rows
    /// transitioned.
    pub fn soft_delete_all<H: SoftDeleteHooks>(
        &self,
        conn: &Connection,
        filter: &Filter,
        hooks: &mut H,
    ) -> BehaviorResult<usize> {
        let sql = format!(
            "SELECT {ID_COLUMN} FROM {table}{where_clause};",
            table = self.table,
            where_clause = filter.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(filter.params()), |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        for id in &ids {
            self.soft_delete_with(conn, *id, hooks)?;
        }

        Ok(ids.len())
    }

    /// Physically deletes every row matched by `filter` in one statement.
    pub fn really_destroy_all(&self, conn: &Connection, filter: &Filter) -> BehaviorResult<usize> {
        let sql = format!(
            "DELETE FROM {table}{where_clause};",
            table = self.table,
            where_clause = filter.where_clause()
        );
        let changed = conn.execute(&sql, params_from_iter(filter.params()))?;
        Ok(changed)
    }

    fn push_touch(&self, sql: &mut String) {
        if self.touch {
            sql.push_str(&format!(
                ", {touch} = (strftime('%s', 'now') * 1000)",
                touch = self.touch_field
            ));
        }
    }

    fn not_found(&self, id: i64) -> BehaviorError {
        BehaviorError::NotFound {
            table: self.table.clone(),
            id,
        }
    }
}
