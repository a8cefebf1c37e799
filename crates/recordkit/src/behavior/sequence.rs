//! Position sequencer behavior.
//!
//! # Responsibility
//! - Maintain a dense integer ordering column across a table: append on
//!   insert, neighbor swaps, relocation with shifting, gap closing on
//!   removal.
//! - Provide the declared default read ordering whether or not maintenance
//!   is enabled.
//!
//! # Invariants
//! - With maintenance enabled, live positions are exactly `1..=N` after
//!   every settled mutation: no gaps, no duplicates.
//! - Mutations are scoped to the full table; there is no sub-grouping.
//! - With maintenance disabled the behavior performs no writes.

use crate::behavior::{BehaviorError, BehaviorResult, ID_COLUMN};
use crate::query::{Order, SortDirection};
use crate::schema::{require_column, require_identifier, require_table, ConfigError};
use log::info;
use rusqlite::{params, Connection, OptionalExtension};

const DEFAULT_FIELD: &str = "position";

/// Validated sequencer configuration for one table.
///
/// Declaring again with a new field or direction constructs a replacement
/// value; the old configuration stops applying wherever callers swap it out.
#[derive(Debug, Clone)]
pub struct Sequenced {
    table: String,
    field: String,
    direction: SortDirection,
    maintain: bool,
}

impl Sequenced {
    /// Declares sequencing on `table` over the default ascending `position`
    /// column, with automatic maintenance enabled.
    pub fn declare(conn: &Connection, table: &str) -> Result<Self, ConfigError> {
        Self::declare_on(conn, table, DEFAULT_FIELD, "asc")
    }

    /// Declares sequencing on `table` over `field` with a direction token.
    /// Unrecognized tokens fall back to ascending. Fails fast when the
    /// ordering field or identity column is absent.
    pub fn declare_on(
        conn: &Connection,
        table: &str,
        field: &str,
        direction: &str,
    ) -> Result<Self, ConfigError> {
        require_identifier(table)?;
        require_identifier(field)?;
        require_table(conn, table)?;
        require_column(conn, table, ID_COLUMN)?;
        require_column(conn, table, field)?;

        let direction = SortDirection::parse(direction);
        info!(
            "event=behavior_declare module=sequence status=ok table={table} field={field} direction={}",
            direction.as_sql()
        );

        Ok(Self {
            table: table.to_string(),
            field: field.to_string(),
            direction,
            maintain: true,
        })
    }

    /// Enables or disables automatic position maintenance. When disabled the
    /// sequencer only provides the default read ordering.
    pub fn with_maintenance(mut self, maintain: bool) -> Self {
        self.maintain = maintain;
        self
    }

    /// Declared default read ordering.
    pub fn order(&self) -> Order {
        Order::new(self.field.clone(), self.direction)
    }

    /// Row ids in the declared order (identity order breaks position ties).
    pub fn ordered_ids(&self, conn: &Connection) -> BehaviorResult<Vec<i64>> {
        let sql = format!(
            "SELECT {ID_COLUMN} FROM {table} {order}, {ID_COLUMN} ASC;",
            table = self.table,
            order = self.order().sql()
        );
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Next unused position: current maximum plus one.
    pub fn next_position(&self, conn: &Connection) -> BehaviorResult<i64> {
        self.guard_maintenance()?;
        let next: i64 = conn.query_row(
            &format!(
                "SELECT COALESCE(MAX({field}), 0) + 1 FROM {table};",
                field = self.field,
                table = self.table
            ),
            [],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    /// Places a freshly inserted row at the end of the sequence and returns
    /// its position.
    pub fn append(&self, conn: &Connection, id: i64) -> BehaviorResult<i64> {
        self.guard_maintenance()?;
        let changed = conn.execute(
            &format!(
                "UPDATE {table}
                 SET {field} = (SELECT COALESCE(MAX({field}), 0) + 1 FROM {table})
                 WHERE {ID_COLUMN} = ?1;",
                table = self.table,
                field = self.field
            ),
            [id],
        )?;
        if changed == 0 {
            return Err(self.not_found(id));
        }
        self.position_of(conn, id)
    }

    /// Swaps the row with its neighbor one position closer to the top.
    /// No-op when the row is already first.
    pub fn move_higher(&self, conn: &mut Connection, id: i64) -> BehaviorResult<()> {
        self.swap_with_neighbor(conn, id, NeighborSide::Above)
    }

    /// Swaps the row with its neighbor one position closer to the bottom.
    /// No-op when the row is already last.
    pub fn move_lower(&self, conn: &mut Connection, id: i64) -> BehaviorResult<()> {
        self.swap_with_neighbor(conn, id, NeighborSide::Below)
    }

    /// Relocates the row to position 1, shifting every row above it down by
    /// one.
    pub fn move_to_top(&self, conn: &mut Connection, id: i64) -> BehaviorResult<()> {
        self.guard_maintenance()?;
        let tx = conn.transaction()?;
        let position = self.require_position(&tx, id)?;

        tx.execute(
            &format!(
                "UPDATE {table} SET {field} = {field} + 1 WHERE {field} < ?1;",
                table = self.table,
                field = self.field
            ),
            [position],
        )?;
        tx.execute(
            &format!(
                "UPDATE {table} SET {field} = 1 WHERE {ID_COLUMN} = ?1;",
                table = self.table,
                field = self.field
            ),
            [id],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Relocates the row to the current maximum position, shifting every row
    /// below it up by one.
    pub fn move_to_bottom(&self, conn: &mut Connection, id: i64) -> BehaviorResult<()> {
        self.guard_maintenance()?;
        let tx = conn.transaction()?;
        let position = self.require_position(&tx, id)?;
        let max: i64 = tx.query_row(
            &format!(
                "SELECT COALESCE(MAX({field}), 0) FROM {table};",
                field = self.field,
                table = self.table
            ),
            [],
            |row| row.get(0),
        )?;

        tx.execute(
            &format!(
                "UPDATE {table} SET {field} = {field} - 1 WHERE {field} > ?1;",
                table = self.table,
                field = self.field
            ),
            [position],
        )?;
        tx.execute(
            &format!(
                "UPDATE {table} SET {field} = ?1 WHERE {ID_COLUMN} = ?2;",
                table = self.table,
                field = self.field
            ),
            params![max, id],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Physically deletes the row and closes the resulting gap by
    /// decrementing every subsequent position.
    pub fn destroy(&self, conn: &mut Connection, id: i64) -> BehaviorResult<()> {
        self.guard_maintenance()?;
        let tx = conn.transaction()?;
        let position = self.require_position(&tx, id)?;

        tx.execute(
            &format!(
                "DELETE FROM {table} WHERE {ID_COLUMN} = ?1;",
                table = self.table
            ),
            [id],
        )?;
        tx.execute(
            &format!(
                "UPDATE {table} SET {field} = {field} - 1 WHERE {field} > ?1;",
                table = self.table,
                field = self.field
            ),
            [position],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Current position of one row. Rows that were never appended are not
    /// part of the sequence and report not-found.
    pub fn position_of(&self, conn: &Connection, id: i64) -> BehaviorResult<i64> {
        self.require_position(conn, id)
    }

    fn swap_with_neighbor(
        &self,
        conn: &mut Connection,
        id: i64,
        side: NeighborSide,
    ) -> BehaviorResult<()> {
        self.guard_maintenance()?;
        let tx = conn.transaction()?;
        let position = self.require_position(&tx, id)?;

        let (comparison, order) = match side {
            NeighborSide::Above => ("<", "DESC"),
            NeighborSide::Below => (">", "ASC"),
        };
        let neighbor: Option<(i64, i64)> = tx
            .query_row(
                &format!(
                    "SELECT {ID_COLUMN}, {field} FROM {table}
                     WHERE {field} {comparison} ?1
                     ORDER BY {field} {order}
                     LIMIT 1;",
                    field = self.field,
                    table = self.table
                ),
                [position],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((neighbor_id, neighbor_position)) = neighbor {
            tx.execute(
                &format!(
                    "UPDATE {table} SET {field} = ?1 WHERE {ID_COLUMN} = ?2;",
                    table = self.table,
                    field = self.field
                ),
                params![neighbor_position, id],
            )?;
            tx.execute(
                &format!(
                    "UPDATE {table} SET {field} = ?1 WHERE {ID_COLUMN} = ?2;",
                    table = self.table,
                    field = self.field
                ),
                params![position, neighbor_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn require_position(&self, conn: &Connection, id: i64) -> BehaviorResult<i64> {
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
            Some(Some(position)) => Ok(position),
            _ => Err(self.not_found(id)),
        }
    }

    fn guard_maintenance(&self) -> BehaviorResult<()> {
        if self.maintain {
            Ok(())
        } else {
            Err(BehaviorError::SequencingDisabled {
                table: self.table.clone(),
            })
        }
    }

    fn not_found(&self, id: i64) -> BehaviorError {
        BehaviorError::NotFound {
            table: self.table.clone(),
            id,
        }
    }
}

enum NeighborSide {
    Above,
    Below,
}
