//! Identifier obfuscation behavior.
//!
//! # Responsibility
//! - Derive a reversible, salted, collision-checked public identifier from
//!   an internal numeric value at creation time.
//!
//! # Invariants
//! - The stored identifier is unique across the table and immutable once
//!   set.
//! - The collision-retry loop is an optimization; the authoritative guard
//!   is the unique index created at declaration time.

use crate::behavior::{BehaviorError, BehaviorResult, ID_COLUMN};
use crate::schema::{require_column, require_identifier, require_table, ConfigError};
use harsh::Harsh;
use log::info;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

const DEFAULT_HASHID_FIELD: &str = "hashid";
const DEFAULT_MIN_LENGTH: usize = 8;
const DEFAULT_SALT: &str = env!("CARGO_PKG_NAME");
const RANDOM_CANDIDATE_BOUND: u64 = 1_000_000_000;

/// Declaration options for [`Hashidable`]. Unset options take defaults:
/// source field `id`, target field `hashid`, crate-name salt, minimum
/// rendered length 8.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashidOptions<'a> {
    pub field: Option<&'a str>,
    pub hashid_field: Option<&'a str>,
    pub salt: Option<&'a str>,
    pub min_length: Option<usize>,
}

/// Validated obfuscated-identifier configuration for one table.
#[derive(Debug)]
pub struct Hashidable {
    table: String,
    field: String,
    hashid_field: String,
    codec: Harsh,
}

impl Hashidable {
    /// Declares identifier obfuscation on `table` with default options.
    pub fn declare(conn: &Connection, table: &str) -> Result<Self, ConfigError> {
        Self::declare_with(conn, table, HashidOptions::default())
    }

    /// Declares identifier obfuscation on `table` with explicit options.
    ///
    /// Fails fast when a configured column is absent, and creates a unique
    /// index over the target field as the storage-level uniqueness guard.
    pub fn declare_with(
        conn: &Connection,
        table: &str,
        options: HashidOptions<'_>,
    ) -> Result<Self, ConfigError> {
        let field = options.field.unwrap_or(ID_COLUMN);
        let hashid_field = options.hashid_field.unwrap_or(DEFAULT_HASHID_FIELD);
        let salt = options.salt.unwrap_or(DEFAULT_SALT);
        let min_length = options.min_length.unwrap_or(DEFAULT_MIN_LENGTH);

        require_identifier(table)?;
        require_identifier(field)?;
        require_identifier(hashid_field)?;
        require_table(conn, table)?;
        require_column(conn, table, field)?;
        require_column(conn, table, hashid_field)?;

        let codec = Harsh::builder()
            .salt(salt)
            .length(min_length)
            .build()
            .map_err(|err| ConfigError::Codec {
                message: err.to_string(),
            })?;

        conn.execute(
            &format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_{hashid_field}
                 ON {table} ({hashid_field});"
            ),
            [],
        )?;

        info!(
            "event=behavior_declare module=hashid status=ok table={table} field={field} hashid_field={hashid_field} min_length={min_length}"
        );

        Ok(Self {
            table: table.to_string(),
            field: field.to_string(),
            hashid_field: hashid_field.to_string(),
            codec,
        })
    }

    /// Encodes a candidate value into an identifier unused by any persisted
    /// row. `source` seeds the first candidate; `None`, or a collision,
    /// draws random integers in `[0, 1_000_000_000)` until an unused
    /// encoding is produced.
    pub fn generate(&self, conn: &Connection, source: Option<u64>) -> BehaviorResult<String> {
        let mut candidate_value = source;
        loop {
            let value = match candidate_value.take() {
                Some(value) => value,
                None => rand::thread_rng().gen_range(0..RANDOM_CANDIDATE_BOUND),
            };
            let encoded = self.codec.encode(&[value]);
            if !self.hashid_taken(conn, &encoded)? {
                return Ok(encoded);
            }
        }
    }

    /// Generates and persists the identifier for a freshly created row,
    /// seeding the encoding from the row's source field value.
    ///
    /// The identifier is immutable once set: a row that already carries one
    /// keeps it, and the existing value is returned.
    pub fn assign(&self, conn: &Connection, id: i64) -> BehaviorResult<String> {
        let row: Option<(Option<String>, Option<i64>)> = conn
            .query_row(
                &format!(
                    "SELECT {hashid_field}, {field} FROM {table} WHERE {ID_COLUMN} = ?1;",
                    hashid_field = self.hashid_field,
                    field = self.field,
                    table = self.table
                ),
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (existing, source) = match row {
            Some(columns) => columns,
            None => return Err(self.not_found(id)),
        };
        if let Some(hashid) = existing {
            return Ok(hashid);
        }

        let seed = source.and_then(|value| u64::try_from(value).ok());
        let hashid = self.generate(conn, seed)?;

        let changed = conn.execute(
            &format!(
                "UPDATE {table} SET {hashid_field} = ?1 WHERE {ID_COLUMN} = ?2;",
                table = self.table,
                hashid_field = self.hashid_field
            ),
            params![hashid, id],
        )?;
        if changed == 0 {
            return Err(self.not_found(id));
        }

        Ok(hashid)
    }

    /// Reverses an identifier back to the integer it encodes. Returns `None`
    /// for input the codec cannot decode.
    pub fn decode(&self, hashid: &str) -> Option<u64> {
        self.codec
            .decode(hashid)
            .ok()
            .and_then(|values| values.first().copied())
    }

    fn hashid_taken(&self, conn: &Connection, candidate: &str) -> BehaviorResult<bool> {
        let taken: bool = conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {table} WHERE {hashid_field} = ?1);",
                table = self.table,
                hashid_field = self.hashid_field
            ),
            [candidate],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    fn not_found(&self, id: i64) -> BehaviorError {
        BehaviorError::NotFound {
            table: self.table.clone(),
            id,
        }
    }
}
