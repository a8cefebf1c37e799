//! Connection bootstrap helpers.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections with the pragmas behaviors
//!   rely on.
//! - Emit `db_open` logging events with duration and status.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - recordkit owns no schema: tables and columns belong to the host
//!   application, which creates them before declaring behaviors.

use crate::behavior::{BehaviorError, BehaviorResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a SQLite database file ready for behavior declarations.
pub fn open_db(path: impl AsRef<Path>) -> BehaviorResult<Connection> {
    let started_at = Instant::now();
    let opened = Connection::open(path).map_err(BehaviorError::from);
    finish_open(opened, "file", started_at)
}

/// Opens an in-memory SQLite database ready for behavior declarations.
pub fn open_db_in_memory() -> BehaviorResult<Connection> {
    let started_at = Instant::now();
    let opened = Connection::open_in_memory().map_err(BehaviorError::from);
    finish_open(opened, "memory", started_at)
}

fn finish_open(
    opened: BehaviorResult<Connection>,
    mode: &str,
    started_at: Instant,
) -> BehaviorResult<Connection> {
    let result = opened.and_then(|conn| {
        bootstrap_connection(&conn)?;
        Ok(conn)
    });

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error={err}",
            started_at.elapsed().as_millis()
        ),
    }

    result
}

fn bootstrap_connection(conn: &Connection) -> BehaviorResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}
